use qlrgen_core::QlrAssembler;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<QlrAssembler>,
}

impl AppState {
    pub fn new(assembler: Arc<QlrAssembler>) -> Self {
        Self { assembler }
    }
}
