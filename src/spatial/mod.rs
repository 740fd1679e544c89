//! Spatial audio cues
//!
//! Places short tones around the listener so the position of the focused
//! element can be heard. Coordinates are metres with x to the right, y
//! forward and z up; angles are degrees.

pub mod calibration;
pub mod player;

pub use calibration::{CalibrationProfile, CalibrationStore};
pub use player::{AplayPlayer, CuePlayer};

use crate::accessibility::Bounds;
use crate::state::config::Config;
use crate::{NvdaError, Result};
use log::warn;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Speed of sound in m/s
const SPEED_OF_SOUND: f32 = 343.0;

/// Fade in/out applied to cues
const FADE_MS: u32 = 5;

/// Delay of the single reflection mixed in for reverb
const ECHO_MS: u32 = 30;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

/// Head orientation; positive yaw turns right, positive pitch looks up
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl Orientation {
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Self {
        Self { yaw, pitch, roll }
    }
}

/// How a source sounds from the listener's position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialCue {
    /// -180..180, positive to the right
    pub azimuth_deg: f32,
    /// -90..90, positive above
    pub elevation_deg: f32,
    pub distance: f32,
    pub left_gain: f32,
    pub right_gain: f32,
    /// Interaural time difference; positive when the right ear hears first
    pub itd_seconds: f32,
    pub attenuation: f32,
    pub reverb: f32,
}

fn wrap_degrees(deg: f32) -> f32 {
    let wrapped = (deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

fn check_finite(what: &str, v: &[f32]) -> Result<()> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(NvdaError::Audio(format!("{} must be finite", what)))
    }
}

/// Listener and source geometry
#[derive(Debug, Clone)]
pub struct Spatializer {
    profile: CalibrationProfile,
    listener: Vec3,
    orientation: Orientation,
    sound: Vec3,
}

impl Spatializer {
    pub fn new(profile: CalibrationProfile) -> Self {
        Self {
            profile,
            listener: Vec3::default(),
            orientation: Orientation::default(),
            sound: Vec3::new(0.0, 1.0, 0.0),
        }
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: CalibrationProfile) {
        self.profile = profile;
    }

    pub fn set_sound_position(&mut self, pos: Vec3) -> Result<()> {
        check_finite("Sound position", &[pos.x, pos.y, pos.z])?;
        self.sound = pos;
        Ok(())
    }

    pub fn sound_position(&self) -> Vec3 {
        self.sound
    }

    pub fn set_listener_position(&mut self, pos: Vec3) -> Result<()> {
        check_finite("Listener position", &[pos.x, pos.y, pos.z])?;
        self.listener = pos;
        Ok(())
    }

    pub fn listener_position(&self) -> Vec3 {
        self.listener
    }

    pub fn set_listener_orientation(&mut self, orientation: Orientation) -> Result<()> {
        check_finite(
            "Orientation",
            &[orientation.yaw, orientation.pitch, orientation.roll],
        )?;
        self.orientation = orientation;
        Ok(())
    }

    pub fn listener_orientation(&self) -> Orientation {
        self.orientation
    }

    /// Cue for the current sound position
    pub fn cue(&self) -> SpatialCue {
        self.render(self.sound)
    }

    /// Cue for a source at `source`
    pub fn render(&self, source: Vec3) -> SpatialCue {
        let rel = source.sub(self.listener);
        let distance = rel.length();
        let horizontal = (rel.x * rel.x + rel.y * rel.y).sqrt();

        let (azimuth_deg, elevation_deg) = if distance == 0.0 {
            (0.0, 0.0)
        } else {
            let world_az = rel.x.atan2(rel.y).to_degrees();
            let world_el = rel.z.atan2(horizontal).to_degrees();
            (
                wrap_degrees(world_az - self.orientation.yaw),
                (world_el - self.orientation.pitch).clamp(-90.0, 90.0),
            )
        };

        let az = azimuth_deg.to_radians();
        let el = elevation_deg.to_radians();

        // Equal-power pan on the lateral component
        let pan = az.sin() * el.cos();
        let angle = (pan + 1.0) * FRAC_PI_4;
        let (left_gain, right_gain) = (angle.cos(), angle.sin());

        // Woodworth spherical-head model
        let lateral = pan.clamp(-1.0, 1.0).asin().clamp(-FRAC_PI_2, FRAC_PI_2);
        let itd_seconds = self.profile.head_radius / SPEED_OF_SOUND * (lateral + lateral.sin());

        let attenuation = 1.0 / (1.0 + distance);
        let reverb = self.profile.reverb * (distance / self.profile.room_diagonal()).min(1.0);

        SpatialCue {
            azimuth_deg,
            elevation_deg,
            distance,
            left_gain,
            right_gain,
            itd_seconds,
            attenuation,
            reverb,
        }
    }
}

/// Stereo 16-bit PCM (interleaved L, R) of a tone heard as `cue`
///
/// The far ear gets the tone delayed by the ITD; a single quiet reflection
/// stands in for room reverb.
pub fn synthesize_tone(
    cue: &SpatialCue,
    frequency: f32,
    duration_ms: u32,
    volume: f32,
    sample_rate: u32,
) -> Vec<i16> {
    let frames = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
    let fade = (sample_rate as u64 * FADE_MS as u64 / 1000).max(1) as usize;
    let delay = (cue.itd_seconds.abs() * sample_rate as f32).round() as usize;
    let echo = (sample_rate as u64 * ECHO_MS as u64 / 1000) as usize;
    let amplitude = volume.clamp(0.0, 1.0) * cue.attenuation * i16::MAX as f32;

    let dry = |i: isize| -> f32 {
        if i < 0 || i as usize >= frames {
            return 0.0;
        }
        let i = i as usize;
        let envelope = (i.min(frames - 1 - i) as f32 / fade as f32).min(1.0);
        (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin() * envelope
    };
    let wet = |i: isize| dry(i) + cue.reverb * 0.5 * dry(i - echo as isize);

    let (left_delay, right_delay) = if cue.itd_seconds >= 0.0 {
        (delay, 0)
    } else {
        (0, delay)
    };

    let mut samples = Vec::with_capacity(frames * 2);
    for i in 0..frames as isize {
        let left = wet(i - left_delay as isize) * cue.left_gain * amplitude;
        let right = wet(i - right_delay as isize) * cue.right_gain * amplitude;
        samples.push(left.clamp(i16::MIN as f32, i16::MAX as f32) as i16);
        samples.push(right.clamp(i16::MIN as f32, i16::MAX as f32) as i16);
    }
    samples
}

/// Place a screen rectangle on a 2 m wide arc one metre in front
pub fn screen_position(bounds: &Bounds, screen: (u32, u32)) -> Vec3 {
    let (width, height) = (screen.0.max(1) as f32, screen.1.max(1) as f32);
    let (cx, cy) = bounds.center();
    let fx = (cx as f32 / width).clamp(0.0, 1.0);
    let fy = (cy as f32 / height).clamp(0.0, 1.0);
    Vec3::new((fx - 0.5) * 2.0, 1.0, 0.5 - fy)
}

/// Spatializer plus a player: plays cues for on-screen positions
pub struct SpatialOutput {
    pub spatializer: Spatializer,
    pub store: CalibrationStore,
    player: Box<dyn CuePlayer>,
    pub frequency: f32,
    pub volume: f32,
    pub duration_ms: u32,
    pub sample_rate: u32,
    pub screen: (u32, u32),
}

impl SpatialOutput {
    pub fn new(store: CalibrationStore, player: Box<dyn CuePlayer>) -> Self {
        Self {
            spatializer: Spatializer::new(*store.current_profile()),
            store,
            player,
            frequency: 1000.0,
            volume: 0.5,
            duration_ms: 60,
            sample_rate: DEFAULT_SAMPLE_RATE,
            screen: (1920, 1080),
        }
    }

    /// Switch calibration profile
    pub fn calibrate(&mut self, name: Option<&str>) -> Result<()> {
        let profile = *self.store.calibrate(name)?;
        self.spatializer.set_profile(profile);
        Ok(())
    }

    /// Play a cue at a world position
    pub fn play_at(&mut self, pos: Vec3) -> Result<()> {
        self.spatializer.set_sound_position(pos)?;
        let cue = self.spatializer.cue();
        let pcm = synthesize_tone(&cue, self.frequency, self.duration_ms, self.volume, self.sample_rate);
        self.player.play(&pcm, self.sample_rate)
    }

    /// Play a cue where a screen rectangle is
    pub fn play_for_bounds(&mut self, bounds: &Bounds) -> Result<()> {
        self.play_at(screen_position(bounds, self.screen))
    }

    pub fn stop(&mut self) -> Result<()> {
        self.player.stop()
    }
}

/// Spatial output configured from `[spatial_audio]` and `[sound]`
pub fn create_output(config: &Config) -> Result<SpatialOutput> {
    let mut store = CalibrationStore::load(&config.spatial_profiles_path())?;
    let wanted = config.spatial_profile();
    if let Err(e) = store.calibrate(Some(&wanted)) {
        warn!("{}; using {}", e, store.current_name());
    }
    let player = player::create_player()?;
    let mut output = SpatialOutput::new(store, player);
    output.frequency = config.beep_frequency();
    output.volume = config.beep_volume();
    output.screen = config.spatial_screen_size();
    Ok(output)
}
