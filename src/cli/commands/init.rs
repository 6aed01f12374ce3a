//! Init command implementation
//!
//! Writes a starter configuration with freshly generated correspondence store
//! keys.

use crate::store::crypto::{generate_key_base64, ENCRYPTION_KEY_LEN};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "veil.toml")]
    pub output: String,

    /// Include example policies
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Veil configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let mut content = Self::generate_base_config(
            &generate_key_base64(ENCRYPTION_KEY_LEN),
            &generate_key_base64(32),
        );
        if self.with_examples {
            content.push_str(Self::example_policies());
        }

        match fs::write(&self.output, content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Move the generated store keys into a secret manager or .env file");
                println!("     and reference them as ${{VEIL_STORE_ENCRYPTION_KEY}} / ${{VEIL_STORE_HMAC_KEY}}");
                println!("  2. Declare a policy for every field of your datasets");
                println!("  3. Validate configuration: veil validate-config");
                println!("  4. Run: veil transform --input dataset.json --output out.json");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    fn generate_base_config(encryption_key: &str, hmac_key: &str) -> String {
        format!(
            r#"# Veil Configuration File

[application]
log_level = "info"

[engine]
# Unmatched fields and field failures abort the batch
strict_mode = true
# Techniques for fields no policy matches (absent: none)
# default_technique = [{{ technique = "suppress" }}]
# perturbation_seed = 42
reversible_by_default = false
workers = 4
stable_ordering = true
store_timeout_ms = 2000
store_failure = "fail_record"   # fail_record | one_way_fallback
on_error = "discard"            # discard | return_partial

[risk]
enabled = false
# quasi_identifiers = [["zip", "birthYear"]]
k_min = 5
apply_suppression = true
outlier_detection = true
outlier_ignore = []

[store]
backend = "journal"             # memory | journal
path = "./data/correspondence.jsonl"
encryption_key = "{encryption_key}"
hmac_key = "{hmac_key}"

[logging]
local_enabled = true
local_path = "./logs"
local_rotation = "daily"        # daily | hourly | never
local_max_size_mb = 100
"#
        )
    }

    fn example_policies() -> &'static str {
        r#"
[[policies]]
matcher = { field = "id" }
techniques = [{ technique = "pseudonymize", technique_id = "customer", reversible = true }]

[[policies]]
matcher = { field = "email" }
techniques = [{ technique = "mask", keep_leading = 1 }]

[[policies]]
matcher = { type = "postal_code" }
precedence = 10
techniques = [{ technique = "generalize", kind = "postal_prefix", prefix_len = 3 }]

[[policies]]
matcher = { field = "birthYear" }
techniques = [{ technique = "generalize", kind = "numeric_bucket", width = 5 }]

[[policies]]
matcher = { pattern = "^(notes|comment)$" }
precedence = 20
techniques = [{ technique = "suppress" }]
"#
    }
}
