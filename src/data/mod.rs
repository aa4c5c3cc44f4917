//! Synthetic wearable sensor data.
//!
//! Generates 3-axis accelerometer samples labeled into three motion
//! classes. A [`Persona`] controls the noise multiplier applied to
//! everyday movement, which in turn controls how separable the classes are.
//!
//! | Class | Pattern |
//! |-------|---------|
//! | [`MotionClass::Normal`] | sine/cosine walking pattern, ~1g vertical |
//! | [`MotionClass::HardSit`] | sudden medium spike on the y axis |
//! | [`MotionClass::Fall`] | near free-fall then a large vertical spike |

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of input features per sample (x, y, z acceleration).
pub const NUM_FEATURES: usize = 3;

/// Number of motion classes.
pub const NUM_CLASSES: usize = 3;

/// Probability threshold above which a sample is a fall (~10%).
const FALL_THRESHOLD: f32 = 0.9;

/// Probability threshold above which a non-fall sample is a hard sit (~20%).
const HARD_SIT_THRESHOLD: f32 = 0.8;

/// Named client profile controlling synthetic data noise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// High-impact movement, noisy everyday motion
    Athlete,
    /// Slow, low-noise movement
    Senior,
    /// In between
    Average,
}

impl Persona {
    /// All personas, in display order.
    pub const ALL: [Persona; 3] = [Persona::Athlete, Persona::Senior, Persona::Average];

    /// Lowercase name used in config, CLI and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Athlete => "athlete",
            Persona::Senior => "senior",
            Persona::Average => "average",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "athlete" => Ok(Persona::Athlete),
            "senior" => Ok(Persona::Senior),
            "average" => Ok(Persona::Average),
            other => Err(format!(
                "unknown persona '{}'. Use 'athlete', 'senior', or 'average'",
                other
            )),
        }
    }
}

/// Per-persona noise multiplier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaNoise {
    /// Athlete noise multiplier
    pub athlete: f32,
    /// Senior noise multiplier
    pub senior: f32,
    /// Average noise multiplier
    pub average: f32,
}

impl Default for PersonaNoise {
    fn default() -> Self {
        Self {
            athlete: 0.5,
            senior: 0.1,
            average: 0.2,
        }
    }
}

impl PersonaNoise {
    /// Noise multiplier for a persona.
    pub fn for_persona(&self, persona: Persona) -> f32 {
        match persona {
            Persona::Athlete => self.athlete,
            Persona::Senior => self.senior,
            Persona::Average => self.average,
        }
    }
}

/// Motion class label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionClass {
    /// Normal activity of daily living
    Normal = 0,
    /// Hard sit (the false-alarm trap)
    HardSit = 1,
    /// Fall
    Fall = 2,
}

/// Labeled sample set generated for one persona.
#[derive(Clone, Debug)]
pub struct Dataset {
    /// Persona the data was generated for
    pub persona: Persona,
    /// Samples, shape `(n, NUM_FEATURES)`
    pub features: Array2<f32>,
    /// One-hot labels, shape `(n, NUM_CLASSES)`
    pub labels: Array2<f32>,
}

impl Dataset {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    /// Whether the dataset has no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample count per class, indexed by [`MotionClass`] discriminant.
    pub fn class_counts(&self) -> [usize; NUM_CLASSES] {
        let mut counts = [0; NUM_CLASSES];
        for row in self.labels.rows() {
            if let Some(idx) = row.iter().position(|&v| v == 1.0) {
                counts[idx] += 1;
            }
        }
        counts
    }
}

/// Generate `num_samples` labeled samples for `persona`.
///
/// Data is drawn fresh from `rng` on every call; callers never reuse a
/// dataset across rounds.
pub fn generate_persona_data<R: Rng>(
    persona: Persona,
    noise: f32,
    num_samples: usize,
    rng: &mut R,
) -> Dataset {
    let mut features = Array2::<f32>::zeros((num_samples, NUM_FEATURES));
    let mut labels = Array2::<f32>::zeros((num_samples, NUM_CLASSES));

    for i in 0..num_samples {
        let is_fall = rng.gen::<f32>() > FALL_THRESHOLD;
        let is_hard_sit = rng.gen::<f32>() > HARD_SIT_THRESHOLD && !is_fall;

        let (sample, class) = if is_fall {
            (
                [
                    rng.gen::<f32>() * 0.1,
                    rng.gen::<f32>() * 0.1,
                    9.8 + rng.gen::<f32>() * 5.0,
                ],
                MotionClass::Fall,
            )
        } else if is_hard_sit {
            (
                [
                    rng.gen::<f32>() * noise,
                    2.0 + rng.gen::<f32>(),
                    rng.gen::<f32>(),
                ],
                MotionClass::HardSit,
            )
        } else {
            let t = i as f32;
            (
                [
                    t.sin() * noise,
                    t.cos() * noise,
                    1.0 + rng.gen::<f32>() * noise,
                ],
                MotionClass::Normal,
            )
        };

        for (j, v) in sample.iter().enumerate() {
            features[[i, j]] = *v;
        }
        labels[[i, class as usize]] = 1.0;
    }

    Dataset {
        persona,
        features,
        labels,
    }
}
