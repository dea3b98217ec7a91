use crate::output::{print_json, print_table};
use anyhow::Context;
use phasegate_core::{
    config::Config,
    generator::{Generator, GeneratorOptions, Invocation},
    schema::{display_value, SchemaModel},
};
use std::path::Path;

pub fn run(
    root: &Path,
    schema_path: &Path,
    endpoint: Option<&str>,
    method: &str,
    json: bool,
) -> anyhow::Result<()> {
    let schema = SchemaModel::load(schema_path)
        .with_context(|| format!("failed to load schema {}", schema_path.display()))?;
    let config = Config::load_or_default(root);

    let stem = schema_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let endpoint = endpoint.map(str::to_string).unwrap_or_else(|| endpoint_from_stem(&stem));
    let options = GeneratorOptions::from_config(&config.generator, &endpoint).with_method(method);
    let artifacts = Generator::new(options)
        .generate(&schema)
        .context("schema rejected")?;

    if json {
        return print_json(&artifacts);
    }

    println!("{} {}\n", artifacts.method, endpoint);

    println!("Parameters:");
    let rows = artifacts
        .parameters
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.ty.to_string(),
                if p.required { "yes" } else { "no" }.to_string(),
                p.default.as_ref().map(display_value).unwrap_or_default(),
                p.constraints.join("; "),
                p.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(
        &["NAME", "TYPE", "REQUIRED", "DEFAULT", "CONSTRAINTS", "DESCRIPTION"],
        rows,
    );

    println!("\nExamples:");
    for example in &artifacts.examples {
        println!("\n# {}: {}", example.name, example.description);
        println!("{}", curl(&example.invocation));
    }

    println!("\nTest cases:");
    let rows = artifacts
        .test_cases
        .iter()
        .map(|tc| {
            vec![
                tc.name.clone(),
                tc.kind.as_str().to_string(),
                tc.target.clone().unwrap_or_else(|| "-".to_string()),
                tc.expected_status.to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "KIND", "FIELD", "STATUS"], rows);
    Ok(())
}

/// `brand-request` stays as is; `brand.schema` drops the suffix.
fn endpoint_from_stem(stem: &str) -> String {
    stem.split('.').next().unwrap_or(stem).to_string()
}

fn curl(inv: &Invocation) -> String {
    let mut url = inv.url.clone();
    if !inv.query.is_empty() {
        let query: Vec<String> = inv
            .query
            .iter()
            .map(|p| format!("{}={}", encode(&p.name), encode(&p.value)))
            .collect();
        url = format!("{url}?{}", query.join("&"));
    }
    let mut out = format!("curl -X {} '{}'", inv.method, url);
    for header in &inv.headers {
        out.push_str(&format!(" \\\n  -H '{}: {}'", header.name, header.value));
    }
    if let Some(body) = &inv.body {
        let data = serde_json::to_string(body).unwrap_or_default();
        out.push_str(&format!(" \\\n  -d '{}'", data.replace('\'', "'\\''")));
    }
    out
}

/// Percent-encode everything outside the unreserved set.
fn encode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}
