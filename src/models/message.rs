use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<Content>,
}

impl Message {
    /// Creates a new `Message` instance with the given role and content.
    ///
    /// # Arguments
    ///
    /// * `role` - The role of the message sender.
    /// * `content` - A vector of `Content` blocks making up the message.
    ///
    /// # Returns
    ///
    /// A new `Message` instance.
    pub fn new(role: Role, content: Vec<Content>) -> Self {
        Self { role, content }
    }

    /// Creates a new `MessageBuilder` instance.
    ///
    /// # Returns
    ///
    /// A `MessageBuilder` for building a `Message` instance with specified role and content.
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }
}

/// A builder for creating `Message` instances with specified role and content.
pub struct MessageBuilder {
    role: Option<Role>,
    content: Vec<Content>,
}

impl MessageBuilder {
    /// Creates a new `MessageBuilder` instance.
    ///
    /// # Returns
    ///
    /// A `MessageBuilder` instance with empty role and content fields.
    pub fn new() -> Self {
        Self {
            role: None,
            content: vec![],
        }
    }

    /// Sets the role for the `Message`.
    ///
    /// # Arguments
    ///
    /// * `role` - The role of the message sender (e.g., "user" or "assistant").
    ///
    /// # Returns
    ///
    /// The builder instance with the specified role.
    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Appends a base64 image block.
    ///
    /// # Arguments
    ///
    /// * `media_type` - MIME type of the image, e.g. `image/png`.
    /// * `data` - Base64 payload without any data-URI prefix.
    ///
    /// # Returns
    ///
    /// The builder instance with the image block added.
    pub fn add_image(mut self, media_type: &str, data: &str) -> Self {
        self.content.push(Content::Image {
            source: ImageSource::base64(media_type, data),
        });
        self
    }

    /// Appends a text block.
    ///
    /// # Arguments
    ///
    /// * `text` - The actual text content.
    ///
    /// # Returns
    ///
    /// The builder instance with the text block added.
    pub fn add_text(mut self, text: &str) -> Self {
        self.content.push(Content::Text {
            text: text.to_owned(),
        });
        self
    }

    /// Builds the `Message` instance.
    ///
    /// # Returns
    ///
    /// A `Message` instance with the specified role and content.
    pub fn build(self) -> Result<Message, Error> {
        Ok(Message {
            role: self
                .role
                .ok_or(Error::ConfigError("Role is required".to_owned()))?,
            content: self.content,
        })
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A single block of message content, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Image { source: ImageSource },
    Text { text: String },
}

/// Inline image payload of an image block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

impl ImageSource {
    pub fn base64(media_type: &str, data: &str) -> Self {
        Self {
            source_type: "base64".to_owned(),
            media_type: media_type.to_owned(),
            data: data.to_owned(),
        }
    }
}

/// Role enumerates the different roles involved in message exchange.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
    User,
}
