use crate::config::DispatchConfig;
pub mod phone;
pub mod template;

use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use std::thread;
use thiserror::Error;
use url::form_urlencoded;

#[derive(Error, Debug)]
pub enum SendError {
    #[error("Failed to open WhatsApp Web: {0}")]
    Browser(#[from] std::io::Error),

    #[error("Input automation is not available: {0}")]
    AutomationUnavailable(String),

    #[error("Failed to simulate input: {0}")]
    Input(String),
}

/// Hands one rendered message to the outside world.
///
/// There is no delivery acknowledgment: `Ok` only means nothing raised.
pub trait Dispatcher {
    fn send(&mut self, phone: &str, message: &str) -> Result<(), SendError>;
}

/// Sends through WhatsApp Web by opening a prefilled chat and driving the keyboard.
pub struct WhatsAppWeb {
    config: DispatchConfig,
}

impl WhatsAppWeb {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn chat_url(&self, phone: &str, message: &str) -> String {
        let text: String = form_urlencoded::byte_serialize(message.as_bytes()).collect();
        format!(
            "{}/send?phone={}&text={}",
            self.config.web_url.trim_end_matches('/'),
            form_urlencoded::byte_serialize(phone.as_bytes()).collect::<String>(),
            text
        )
    }

    fn press(enigo: &mut Enigo, key: Key) -> Result<(), SendError> {
        enigo
            .key(key, Direction::Click)
            .map_err(|e| SendError::Input(e.to_string()))
    }

    fn close_tab(enigo: &mut Enigo) -> Result<(), SendError> {
        let modifier = if cfg!(target_os = "macos") {
            Key::Meta
        } else {
            Key::Control
        };
        let input = |e: enigo::InputError| SendError::Input(e.to_string());

        enigo.key(modifier, Direction::Press).map_err(input)?;
        let typed = enigo.key(Key::Unicode('w'), Direction::Click).map_err(input);
        enigo.key(modifier, Direction::Release).map_err(input)?;
        typed
    }
}

impl Dispatcher for WhatsAppWeb {
    fn send(&mut self, phone: &str, message: &str) -> Result<(), SendError> {
        let url = self.chat_url(phone, message);
        log::debug!("Opening chat for {}", phone);
        webbrowser::open(&url)?;
        thread::sleep(self.config.load_wait());

        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| SendError::AutomationUnavailable(e.to_string()))?;

        // Focus the chat page before sending
        let (width, height) = enigo
            .main_display()
            .map_err(|e| SendError::Input(e.to_string()))?;
        enigo
            .move_mouse(width / 2, height / 2, Coordinate::Abs)
            .map_err(|e| SendError::Input(e.to_string()))?;
        enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| SendError::Input(e.to_string()))?;
        Self::press(&mut enigo, Key::Return)?;

        thread::sleep(self.config.confirm_delay());
        Self::press(&mut enigo, Key::Return)?;

        thread::sleep(self.config.close_delay());
        if self.config.close_tab {
            Self::close_tab(&mut enigo)?;
        }

        log::debug!("Automation finished for {}", phone);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(web_url: &str) -> WhatsAppWeb {
        WhatsAppWeb::new(DispatchConfig {
            web_url: web_url.to_string(),
            load_wait_secs: 0,
            confirm_delay_secs: 0,
            close_delay_secs: 0,
            close_tab: true,
        })
    }

    #[test]
    fn chat_url_encodes_phone_and_text() {
        let url = dispatcher("https://web.whatsapp.com/")
            .chat_url("+6281234567890", "Hi Budi, balance 1.500 & more\nThanks");

        assert_eq!(
            url,
            "https://web.whatsapp.com/send?phone=%2B6281234567890&text=Hi+Budi%2C+balance+1.500+%26+more%0AThanks"
        );
    }

    #[test]
    fn chat_url_keeps_custom_base() {
        let url = dispatcher("http://localhost:8080").chat_url("+1234567890", "ok");
        assert_eq!(url, "http://localhost:8080/send?phone=%2B1234567890&text=ok");
    }
}
