use std::collections::BTreeMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Speed and pitch applied to a speaker's synthesized speech
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub speed: f32,
    pub pitch_semitones: f32,
}

impl VoiceProfile {
    pub const NEUTRAL: VoiceProfile = VoiceProfile { speed: 1.0, pitch_semitones: 0.0 };

    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }
}

const BUILTIN_PROFILES: [(&str, VoiceProfile); 5] = [
    ("A", VoiceProfile { speed: 1.0, pitch_semitones: 0.0 }),
    ("B", VoiceProfile { speed: 0.95, pitch_semitones: 2.0 }),
    ("C", VoiceProfile { speed: 1.05, pitch_semitones: -2.0 }),
    ("D", VoiceProfile { speed: 0.9, pitch_semitones: 4.0 }),
    ("E", VoiceProfile { speed: 1.1, pitch_semitones: -4.0 }),
];

/// Per-run mapping from speaker label to voice profile.
///
/// Speakers `A` to `E` get fixed profiles. Any other speaker is assigned a
/// profile derived from the registry seed and the speaker label, so the same
/// seed always yields the same voices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceProfileRegistry {
    seed: u64,
    profiles: BTreeMap<String, VoiceProfile>,
}

impl VoiceProfileRegistry {
    pub fn new(seed: u64) -> Self {
        let profiles = BUILTIN_PROFILES
            .iter()
            .map(|(speaker, profile)| (speaker.to_string(), *profile))
            .collect();
        Self { seed, profiles }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Profile for `speaker`, assigning one on first sight
    pub fn profile_for(&mut self, speaker: &str) -> VoiceProfile {
        if let Some(profile) = self.profiles.get(speaker) {
            return *profile;
        }

        let profile = self.derive_profile(speaker);
        debug!("Assigned voice profile {:?} to speaker {}", profile, speaker);
        self.profiles.insert(speaker.to_string(), profile);
        profile
    }

    /// Profile for `speaker` if already assigned
    pub fn get(&self, speaker: &str) -> Option<VoiceProfile> {
        self.profiles.get(speaker).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VoiceProfile)> {
        self.profiles.iter().map(|(speaker, profile)| (speaker.as_str(), profile))
    }

    fn derive_profile(&self, speaker: &str) -> VoiceProfile {
        let mut rng = StdRng::seed_from_u64(self.seed ^ speaker_hash(speaker));

        VoiceProfile {
            speed: rng.gen_range(0.9..=1.1),
            pitch_semitones: rng.gen_range(-4.0..=4.0),
        }
    }
}

/// 64-bit FNV-1a over the label bytes, fixed across toolchains
fn speaker_hash(speaker: &str) -> u64 {
    speaker
        .bytes()
        .fold(0xcbf29ce484222325, |hash, b| (hash ^ u64::from(b)).wrapping_mul(0x100000001b3))
}

impl Default for VoiceProfileRegistry {
    fn default() -> Self {
        Self::new(0)
    }
}
