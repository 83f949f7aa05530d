//! Bitcrusher: sample rate reduction by sample-and-hold, combined with bit
//! depth reduction by amplitude quantization.

use alloc::vec;
use alloc::vec::Vec;

#[allow(unused_imports)]
use num_traits::float::Float;

/// Highest supported quantizer resolution in bits.
pub const MAX_BIT_DEPTH: u32 = 24;

/// Rejected configuration values.
///
/// Invalid configuration is always reported, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The reduction factor must be at least 1.
    ZeroReductionFactor,
    /// The bit depth must be in `1..=MAX_BIT_DEPTH`.
    BitDepthOutOfRange(u32),
    /// A bank needs at least one channel.
    ZeroChannelCount,
    /// Channel index beyond the bank's channel count.
    ChannelOutOfRange {
        channel: usize,
        channel_count: usize,
    },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ZeroReductionFactor => write!(f, "reduction factor must be at least 1"),
            Self::BitDepthOutOfRange(bits) => {
                write!(f, "bit depth {bits} outside 1..={MAX_BIT_DEPTH}")
            }
            Self::ZeroChannelCount => write!(f, "channel count must be at least 1"),
            Self::ChannelOutOfRange {
                channel,
                channel_count,
            } => write!(f, "channel {channel} out of range for {channel_count} channels"),
        }
    }
}

impl core::error::Error for ConfigError {}

/// Quantize a sample to the nearest level of a signed linear `bit_depth`-bit
/// quantizer with step size `1.0 / 2^(bit_depth - 1)`.
///
/// Ties round half away from zero. At depth 24 the step is small enough that
/// inputs in [-1.0, 1.0] come back unchanged within 1e-6. Non-finite samples
/// pass through unchanged; sanitization is up to the caller.
///
/// `bit_depth` must be in `1..=MAX_BIT_DEPTH`.
#[inline]
pub fn quantize(sample: f32, bit_depth: u32) -> f32 {
    round_to_scale(sample, level_scale(bit_depth))
}

#[inline]
fn round_to_scale(sample: f32, scale: f32) -> f32 {
    (sample * scale).round() / scale
}

#[inline]
fn level_scale(bit_depth: u32) -> f32 {
    (1i32 << (bit_depth - 1)) as f32
}

/// Single-channel crusher engine.
///
/// Carries the sample-and-hold state across block boundaries: a sequence of
/// `process` calls produces the same output as one call on the concatenated
/// blocks, whatever the block sizes. One instance per channel; channels never
/// share state.
#[derive(Debug, Clone)]
pub struct Bitcrusher {
    reduction_factor: usize,
    bit_depth: u32,

    // Quantizer scale, derived from bit_depth.
    scale: f32,

    // Sample-and-hold state.
    hold: f32,
    phase: usize,
}

impl Bitcrusher {
    /// Create an engine in the initial resample state (the first sample of
    /// the stream is always freshly quantized).
    pub fn new(reduction_factor: usize, bit_depth: u32) -> Result<Self, ConfigError> {
        let mut crusher = Self {
            reduction_factor: 1,
            bit_depth: MAX_BIT_DEPTH,
            scale: level_scale(MAX_BIT_DEPTH),
            hold: 0.0,
            phase: 0,
        };
        crusher.set_reduction_factor(reduction_factor)?;
        crusher.set_bit_depth(bit_depth)?;

        Ok(crusher)
    }

    /// Drop the carried sample-and-hold state, keeping the configuration.
    pub fn reset(&mut self) {
        self.hold = 0.0;
        self.phase = 0;
    }

    /// Set the number of consecutive output samples sharing one held value.
    /// A factor of 1 disables the sample-and-hold and leaves pure
    /// quantization.
    ///
    /// Legal between blocks; takes effect at the next sample while the
    /// current hold run continues undisturbed.
    pub fn set_reduction_factor(&mut self, reduction_factor: usize) -> Result<(), ConfigError> {
        if reduction_factor == 0 {
            return Err(ConfigError::ZeroReductionFactor);
        }
        self.reduction_factor = reduction_factor;

        Ok(())
    }

    /// Set the quantizer resolution in bits, `1..=MAX_BIT_DEPTH`.
    pub fn set_bit_depth(&mut self, bit_depth: u32) -> Result<(), ConfigError> {
        if !(1..=MAX_BIT_DEPTH).contains(&bit_depth) {
            return Err(ConfigError::BitDepthOutOfRange(bit_depth));
        }
        self.bit_depth = bit_depth;
        self.scale = level_scale(bit_depth);

        Ok(())
    }

    pub fn reduction_factor(&self) -> usize {
        self.reduction_factor
    }

    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    /// Process one block in place.
    ///
    /// Each output sample is the quantized input captured at the start of its
    /// hold run, which may lie in an earlier block. Runs synchronously with
    /// no allocation; blocks may be empty and sizes may vary call to call.
    #[inline]
    pub fn process(&mut self, in_out: &mut [f32]) {
        let mut hold = self.hold;
        let mut phase = self.phase;

        for in_out_sample in in_out.iter_mut() {
            if phase == 0 {
                hold = round_to_scale(*in_out_sample, self.scale);
            }
            *in_out_sample = hold;
            phase += 1;
            if phase >= self.reduction_factor {
                phase = 0;
            }
        }

        self.hold = hold;
        self.phase = phase;
    }
}

/// Independent per-channel crusher engines for a multichannel host.
///
/// Channels share configuration but never state; the host may process them
/// in any order, one block per channel per cycle.
#[derive(Debug, Clone)]
pub struct BitcrusherBank {
    channels: Vec<Bitcrusher>,
}

impl BitcrusherBank {
    pub fn new(
        channel_count: usize,
        reduction_factor: usize,
        bit_depth: u32,
    ) -> Result<Self, ConfigError> {
        if channel_count == 0 {
            return Err(ConfigError::ZeroChannelCount);
        }
        let engine = Bitcrusher::new(reduction_factor, bit_depth)?;

        Ok(Self {
            channels: vec![engine; channel_count],
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Process one channel's block in place.
    #[inline]
    pub fn process(&mut self, channel: usize, in_out: &mut [f32]) -> Result<(), ConfigError> {
        let channel_count = self.channels.len();
        let engine = self
            .channels
            .get_mut(channel)
            .ok_or(ConfigError::ChannelOutOfRange {
                channel,
                channel_count,
            })?;
        engine.process(in_out);

        Ok(())
    }

    /// Direct access to one channel's engine, e.g. for hosts rendering
    /// channels in parallel.
    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut Bitcrusher> {
        self.channels.get_mut(channel)
    }

    /// Set the reduction factor on every channel.
    pub fn set_reduction_factor(&mut self, reduction_factor: usize) -> Result<(), ConfigError> {
        for channel in &mut self.channels {
            channel.set_reduction_factor(reduction_factor)?;
        }

        Ok(())
    }

    /// Set the bit depth on every channel.
    pub fn set_bit_depth(&mut self, bit_depth: u32) -> Result<(), ConfigError> {
        for channel in &mut self.channels {
            channel.set_bit_depth(bit_depth)?;
        }

        Ok(())
    }

    /// Drop carried state on every channel.
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}
