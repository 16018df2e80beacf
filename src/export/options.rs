use super::ExportError;
use serde::{Deserialize, Serialize};

pub const MAX_SPEED: u8 = 10;
pub const MAX_QUANTIZATION_BITS: u8 = 30;

/// Connectivity encoding strategy handed to the Draco encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    Edgebreaker,
    Sequential,
}

/// Attribute channels, in the order of [`EncoderOptions::quantization`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeChannel {
    Position,
    Normal,
    Color,
    TexCoord,
    Generic,
}

impl AttributeChannel {
    pub const ALL: [AttributeChannel; 5] = [
        AttributeChannel::Position,
        AttributeChannel::Normal,
        AttributeChannel::Color,
        AttributeChannel::TexCoord,
        AttributeChannel::Generic,
    ];

    pub fn index(self) -> usize {
        match self {
            AttributeChannel::Position => 0,
            AttributeChannel::Normal => 1,
            AttributeChannel::Color => 2,
            AttributeChannel::TexCoord => 3,
            AttributeChannel::Generic => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttributeChannel::Position => "position",
            AttributeChannel::Normal => "normal",
            AttributeChannel::Color => "color",
            AttributeChannel::TexCoord => "texcoord",
            AttributeChannel::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderOptions {
    pub method: CompressionMethod,
    pub quantization: [u8; 5],
}

impl EncoderOptions {
    pub fn quantization_bits(&self, channel: AttributeChannel) -> u8 {
        self.quantization[channel.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DracoOptions {
    pub decode_speed: u8,
    pub encode_speed: u8,
    pub encoder_options: EncoderOptions,
}

impl Default for DracoOptions {
    fn default() -> Self {
        Self {
            decode_speed: 5,
            encode_speed: 5,
            encoder_options: EncoderOptions {
                method: CompressionMethod::Edgebreaker,
                quantization: [10; 5],
            },
        }
    }
}

/// Options bag passed to a [`SceneExporter`](super::SceneExporter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    pub binary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draco_options: Option<DracoOptions>,
}

impl ExportOptions {
    /// Single binary file, Edgebreaker, 10 quantization bits per channel,
    /// balanced encode/decode speed.
    pub fn compressed_glb() -> Self {
        Self {
            binary: true,
            draco_options: Some(DracoOptions::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ExportError> {
        let Some(draco) = &self.draco_options else {
            return Ok(());
        };

        for (label, speed) in [
            ("decodeSpeed", draco.decode_speed),
            ("encodeSpeed", draco.encode_speed),
        ] {
            if speed > MAX_SPEED {
                return Err(ExportError::InvalidOptions(format!(
                    "{label} {speed} outside 0..={MAX_SPEED}"
                )));
            }
        }

        for channel in AttributeChannel::ALL {
            let bits = draco.encoder_options.quantization_bits(channel);
            if bits == 0 || bits > MAX_QUANTIZATION_BITS {
                return Err(ExportError::InvalidOptions(format!(
                    "{} quantization {bits} bits outside 1..={MAX_QUANTIZATION_BITS}",
                    channel.label()
                )));
            }
        }
        Ok(())
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::compressed_glb()
    }
}
