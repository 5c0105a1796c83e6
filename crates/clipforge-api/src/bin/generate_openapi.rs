use std::path::Path;

use anyhow::Result;

fn main() -> Result<()> {
    let document = clipforge_api::openapi_document();
    clipforge_telemetry::persist_openapi(Path::new("docs/api/openapi.json"), &document)?;
    println!("OpenAPI document written to docs/api/openapi.json");
    Ok(())
}
