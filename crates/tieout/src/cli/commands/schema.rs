use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::emit;
use crate::models::{Envelope, json_schemas};

#[derive(Debug, Clone, Args)]
pub struct SchemaArgs {}

pub fn run(_args: &SchemaArgs) -> Result<()> {
    emit(&execute())
}

#[must_use]
pub fn execute() -> Envelope {
    let schemas = json_schemas();
    let names = schemas
        .as_object()
        .map(|schemas| schemas.keys().cloned().collect::<Vec<_>>())
        .unwrap_or_default();
    Envelope::ok("schema", schemas).with_meta("documents", json!(names))
}
