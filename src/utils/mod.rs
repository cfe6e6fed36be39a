//! Utility functions.
//!
//! Collection of helper functions used across the bot.

use teloxide::types::User;

/// Escape text for Telegram HTML.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Clickable HTML mention of a user.
pub fn mention_html(user: &User) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user.id,
        html_escape(&user.full_name())
    )
}

/// @username if set, the full name otherwise.
pub fn display_name(user: &User) -> String {
    match &user.username {
        Some(u) => format!("@{}", u),
        None => user.full_name(),
    }
}

/// Remove `-name value` from `args` and return the value.
///
/// A trailing `-name` without value is left in place.
pub fn take_option(args: &mut Vec<String>, name: &str) -> Option<String> {
    let flag = format!("-{}", name.trim_start_matches('-'));
    let position = args.iter().position(|arg| *arg == flag)?;
    if position + 1 >= args.len() {
        return None;
    }
    let value = args.remove(position + 1);
    args.remove(position);
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>) -> User {
        serde_json::from_value(serde_json::json!({
            "id": 7,
            "is_bot": false,
            "first_name": "Ada",
            "last_name": "<Lovelace>",
            "username": username,
        }))
        .unwrap()
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_mention_html() {
        assert_eq!(
            mention_html(&user(None)),
            "<a href=\"tg://user?id=7\">Ada &lt;Lovelace&gt;</a>"
        );
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(&user(Some("ada"))), "@ada");
        assert_eq!(display_name(&user(None)), "Ada <Lovelace>");
    }

    #[test]
    fn test_take_option() {
        let mut args: Vec<String> = ["hello", "-lt", "de", "world"].iter().map(|s| s.to_string()).collect();

        assert_eq!(take_option(&mut args, "lt").as_deref(), Some("de"));
        assert_eq!(args, vec!["hello", "world"]);
        assert_eq!(take_option(&mut args, "lf"), None);

        let mut dangling = vec!["hi".to_string(), "-lf".to_string()];
        assert_eq!(take_option(&mut dangling, "-lf"), None);
        assert_eq!(dangling.len(), 2);
    }
}
