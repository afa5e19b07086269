use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../config.template.toml");

    let template = r#"# TSIO Configuration Template
# Copy this file to 'tsio.toml' and adjust the values.
# Every key can also be set through the environment, e.g. TSIO_ANALYZER_PCR_TIMEOUT_MS=300

analyzer_general_timeout_ms = 500
analyzer_discontinuity_timeout_ms = 2000
analyzer_position_timeout_ms = 500
analyzer_pcr_timeout_ms = 200
analyzer_segment_secs = 30

adjuster_max_gap_us = 200000
adjuster_confirm_count = 3
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
