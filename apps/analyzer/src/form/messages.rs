// Inline messages shown in the result area.
// Blocking prompts live on `FormError` instead.

pub const ERROR_MARKER: &str = "❌ Error: ";

pub const UNEXPECTED_RESPONSE: &str = "❌ Unexpected response from server.";

pub const RATE_LIMITED: &str =
    "⏳ Rate limit reached. Please wait a minute before submitting another analysis.";

pub const NETWORK_ERROR: &str =
    "❌ Network error: could not reach the analysis server. Checking server status...";
