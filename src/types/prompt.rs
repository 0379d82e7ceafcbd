use super::message::Message;

/// A structured prompt: an ordered conversation sent to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    messages: Vec<Message>,
    temperature: Option<f32>,
}

impl Prompt {
    /// Create a prompt with a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(content)],
            temperature: None,
        }
    }

    /// Create a prompt with a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(content)],
            temperature: None,
        }
    }

    pub fn with_user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Sampling temperature; the provider default applies when unset.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }
}
