//! Discrete volume ramps for preview playback.
//!
//! The ramp exists purely to avoid audible clicks: one step every 150 ms,
//! asymmetric so the fade-out finishes faster than the fade-in. A new fade
//! always restarts from the current volume; there is no frame-accurate
//! resume of an interrupted ramp.

/// Milliseconds between volume steps.
pub const FADE_TICK_MS: u64 = 150;
/// Volume added per step while fading in.
pub const FADE_IN_STEP: f32 = 0.02;
/// Volume removed per step while fading out.
pub const FADE_OUT_STEP: f32 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    FadingIn,
    Playing,
    FadingOut,
}

/// One in-progress volume ramp.
#[derive(Debug, Clone, Copy)]
pub struct Fade {
    current: f32,
    target: f32,
    step: f32,
}

impl Fade {
    /// Picks the step size from the direction of travel.
    pub fn toward(current: f32, target: f32) -> Self {
        let step = if target > current {
            FADE_IN_STEP
        } else {
            -FADE_OUT_STEP
        };
        Self {
            current,
            target,
            step,
        }
    }

    /// Advances one tick and returns the new volume, clamped at the
    /// target on the final step.
    pub fn advance(&mut self) -> f32 {
        let next = self.current + self.step;
        self.current = if self.step > 0.0 {
            next.min(self.target)
        } else {
            next.max(self.target)
        };
        self.current
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn done(&self) -> bool {
        // Loose tolerance; repeated f32 addition drifts a little.
        (self.current - self.target).abs() < 1e-4
    }
}

/// Last volume actually sent to the player. Ramps start from here, not
/// from the configured target, so an interrupted fade resumes from
/// wherever the volume really sits.
#[derive(Debug, Clone, Copy)]
pub struct VolumeLevel {
    current: f32,
}

impl VolumeLevel {
    pub fn silent() -> Self {
        Self { current: 0.0 }
    }

    pub fn set(&mut self, volume: f32) {
        self.current = volume;
    }

    pub fn fade_to(&self, target: f32) -> Fade {
        Fade::toward(self.current, target)
    }
}
