use clap::Parser;

use crate::completion::DEFAULT_FUNCTION_PATH;
use crate::session::DEFAULT_GREETING;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Completion Endpoint Args ---
    /// Base address of the hosted backend (e.g., https://<project>.supabase.co)
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: String,

    /// Path of the chat completion function relative to the base address
    #[arg(long, env = "CHAT_FUNCTION_PATH", default_value = DEFAULT_FUNCTION_PATH)]
    pub chat_function_path: String,

    /// Publishable key sent as the bearer credential
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    // --- Widget Args ---
    /// Opening assistant message shown before the first question. Empty disables it.
    #[arg(long, env = "CHAT_GREETING", default_value = DEFAULT_GREETING)]
    pub greeting: String,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
