use crate::pipeline::{Pipeline, PipelineError, PipelineOperation};
use crate::query::{EmitQuery, MirEmitQuery, QueryError};
use eight_mir::textual_pass::{Document, MirModuleTextualPass};
use eight_mir::MirModule;

/// Operation for emitting the textual MIR.
pub struct MirEmitOperation;

impl MirEmitOperation {
    pub fn decode<'a>(
        query: &MirEmitQuery,
        module: &MirModule,
        textual_pass: &'a MirModuleTextualPass<'a>,
    ) -> Result<Document<'a>, PipelineError> {
        match query {
            MirEmitQuery::Function(name) => {
                let Some((id, _)) = module.function_by_name(name) else {
                    return Err(QueryError::UnknownFunction {
                        query: format!("mir.fn.{}", name),
                        module: module.name().to_owned(),
                    }
                    .into());
                };
                Ok(textual_pass.visit_function(module, id))
            }
        }
    }
}

impl PipelineOperation<MirModule, MirModule> for MirEmitOperation {
    fn execute(pipeline: &Pipeline, input: MirModule) -> Result<MirModule, PipelineError> {
        let opts = pipeline.options();
        if !opts.emit_mir {
            return Ok(input);
        }
        let textual_pass = MirModuleTextualPass::default();
        // If no query patterns have been specified, we dump the entire module.
        if opts.queries.is_empty() {
            let text =
                MirModuleTextualPass::format_doc_to_string(textual_pass.visit_module(&input));
            println!("{}", text);
            return Ok(input);
        }
        // Otherwise, we emit the results of the queries.
        for query in opts.queries.iter() {
            let EmitQuery::Mir(query) = query;
            let target = Self::decode(query, &input, &textual_pass)?;
            let text = MirModuleTextualPass::format_doc_to_string(target);
            println!("{}", text);
        }
        Ok(input)
    }
}
