/// Build the `min` module for the given layout, and assert that it passes verification.
#[macro_export]
macro_rules! build_verified_min_module {
    ($layout:expr) => {{
        use eight_mir::min_function::{build_min_module, DEFAULT_TARGET_TRIPLE};

        let module = eight_macros::assert_ok!(build_min_module($layout, DEFAULT_TARGET_TRIPLE));
        let result = eight_mir::verify(&module);
        assert!(result.is_valid(), "min module failed verification: {:?}", result);
        module
    }};
}

/// Render a module in its textual form.
#[macro_export]
macro_rules! format_mir_module {
    ($module:expr) => {{
        use eight_mir::textual_pass::MirModuleTextualPass;

        let pass = MirModuleTextualPass::default();
        let doc = pass.visit_module($module);
        MirModuleTextualPass::format_doc_to_string(doc)
    }};
}
