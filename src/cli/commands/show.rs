//! Show command implementation

use super::{report, CommandContext};
use crate::cli::Cli;
use crate::core::diagnose::{render_sources, shown_value};
use crate::core::pipeline::resolve_mapping;
use crate::schema::validate::DEFAULT_SOURCE;
use crate::schema::Schema;
use crate::source::ResolvedMapping;
use clap::Args;
use serde_json::{json, Map, Value};

/// Arguments for the show command
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Print values and sources as JSON
    #[arg(long)]
    pub json: bool,
}

impl ShowArgs {
    /// Execute the show command
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        let ctx = match CommandContext::open(cli) {
            Ok(ctx) => ctx,
            Err(e) => return Ok(report(&e)),
        };
        let mapping = match resolve_mapping(&ctx.options) {
            Ok(mapping) => mapping,
            Err(e) => return Ok(report(&e)),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&sources_json(&mapping, &ctx.schema))?
            );
        } else {
            print!("{}", render_sources(&mapping, &ctx.schema));
        }
        Ok(0)
    }
}

/// Declared fields as `{ NAME: { value, source } }`; secret literals masked
fn sources_json(mapping: &ResolvedMapping, schema: &Schema) -> Value {
    let mut out = Map::new();
    for field in schema.fields() {
        let (value, source) = match mapping.get(&field.name) {
            Some(resolved) => (
                Some(resolved.value.clone()),
                Some(resolved.source_id.clone()),
            ),
            None => (
                field.default.clone(),
                field.default.as_ref().map(|_| DEFAULT_SOURCE.to_string()),
            ),
        };
        let value = match value {
            Some(v) => Value::String(shown_value(field, &v).to_string()),
            None => Value::Null,
        };
        out.insert(field.name.clone(), json!({ "value": value, "source": source }));
    }
    Value::Object(out)
}
