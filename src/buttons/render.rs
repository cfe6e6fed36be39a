//! Turn button records into Telegram inline keyboards.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::database::Button;
use crate::error::ButtonError;

/// Link buttons become URL controls, everything else a callback control.
pub fn render_button(button: &Button) -> Result<InlineKeyboardButton, ButtonError> {
    match &button.url {
        Some(url) => {
            let parsed = Url::parse(url).map_err(|source| ButtonError::InvalidUrl {
                url: url.clone(),
                source,
            })?;
            Ok(InlineKeyboardButton::url(button.text.clone(), parsed))
        }
        None => Ok(InlineKeyboardButton::callback(
            button.text.clone(),
            button.callback_data(None),
        )),
    }
}

pub fn render(rows: &[Vec<Button>]) -> Result<InlineKeyboardMarkup, ButtonError> {
    let rows = rows
        .iter()
        .map(|row| row.iter().map(render_button).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(InlineKeyboardMarkup::new(rows))
}

/// Yes/No controls answering the confirmation of `button`.
pub fn confirmation_keyboard(button: &Button) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("Yes", button.callback_data(Some(true))),
        InlineKeyboardButton::callback("No", button.callback_data(Some(false))),
    ]])
}

#[cfg(test)]
mod tests {
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;

    #[test]
    fn test_link_and_callback_controls() {
        let mut callback = Button::new("p", "Pick", "pick");
        callback.id = "42".to_string();
        let link = Button::link("p", "Google", "https://www.google.com/searchbyimage?image_url=x");

        let markup = render(&[vec![callback, link]]).unwrap();
        let row = &markup.inline_keyboard[0];

        assert!(matches!(&row[0].kind, InlineKeyboardButtonKind::CallbackData(d) if d == "p:42"));
        assert!(
            matches!(&row[1].kind, InlineKeyboardButtonKind::Url(u) if u.host_str() == Some("www.google.com"))
        );
    }

    #[test]
    fn test_invalid_url() {
        let link = Button::link("p", "Broken", "not a url");
        assert!(matches!(
            render_button(&link),
            Err(ButtonError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_confirmation_keyboard() {
        let mut button = Button::new("p", "Delete", "remove").confirm(None);
        button.id = "42".to_string();

        let markup = confirmation_keyboard(&button);
        let row = &markup.inline_keyboard[0];
        assert_eq!(row[0].text, "Yes");
        assert!(matches!(&row[0].kind, InlineKeyboardButtonKind::CallbackData(d) if d == "p:42:1"));
        assert!(matches!(&row[1].kind, InlineKeyboardButtonKind::CallbackData(d) if d == "p:42:0"));
    }
}
