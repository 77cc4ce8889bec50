//! Conventions shared by the client and the server.
//!
//! The wire format is plain UTF-8 WebSocket text frames: no envelope, no
//! message type, no correlation id. Everything the two sides agree on lives
//! here.

/// Sent by the server as soon as a connection is accepted.
pub const WELCOME_MESSAGE: &str = "Welcome! The AI model is ready. Ask your question.";

/// Sent by the server in place of a reply when the completion call fails.
pub const APOLOGY_MESSAGE: &str = "Sorry, there was an error processing your request.";

/// Terminal input that ends the client session instead of being sent.
pub const EXIT_COMMAND: &str = "exit";

/// Label printed in front of every inbound message.
pub const REPLY_LABEL: &str = "AI> ";

/// Prompt shown while the client waits for terminal input.
pub const PROMPT: &str = "You> ";

/// Host the client connects to unless told otherwise.
pub const DEFAULT_HOST: &str = "localhost";

/// Strip surrounding whitespace from a terminal line.
pub fn normalize_line(line: &str) -> &str {
    line.trim()
}

/// Whether a terminal line is the exit sentinel (any case, any padding).
pub fn is_exit_command(line: &str) -> bool {
    normalize_line(line).eq_ignore_ascii_case(EXIT_COMMAND)
}

/// Build the WebSocket URL for a server endpoint.
pub fn server_url(host: &str, port: u16) -> String {
    format!("ws://{}:{}", host, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_command_any_case() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("EXIT"));
        assert!(is_exit_command("  eXiT \n"));
    }

    #[test]
    fn test_exit_command_rejects_other_text() {
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command("quit"));
        assert!(!is_exit_command(""));
        assert!(!is_exit_command("e x i t"));
    }

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line("  What is the capital of France?\r\n"), "What is the capital of France?");
        assert_eq!(normalize_line("   "), "");
    }

    #[test]
    fn test_server_url() {
        assert_eq!(server_url(DEFAULT_HOST, 8080), "ws://localhost:8080");
        assert_eq!(server_url("10.0.0.2", 9001), "ws://10.0.0.2:9001");
    }
}
