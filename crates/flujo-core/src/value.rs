//! Control values and signal blocks carried by graph ports.
//!
//! A [`Value`] is a single control datum: the unit of information flowing over
//! value ports and stored in device parameters. A [`SignalBuffer`] is a block
//! of samples flowing over signal ports. Both are plain owned data; moving one
//! across the thread boundary transfers ownership with it.

/// A dynamically typed control value.
///
/// Mirrors the value set a device parameter can hold. Conversions are total
/// and lossy where necessary (`as_float` on a `Bool` yields 0.0 or 1.0) so a
/// node never has to fail on a type mismatch at tick time.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// A boolean toggle.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A double-precision float.
    Float(f64),
    /// A text value.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A bang with no payload; its arrival is the information.
    Impulse,
}

impl Value {
    /// Converts the value to a float, lossily.
    ///
    /// `Impulse`, `String` and `List` convert to 0.0 (a `List` whose first
    /// element is numeric converts to that element).
    pub fn as_float(&self) -> f64 {
        match self {
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::List(l) => l.first().map_or(0.0, Value::as_float),
            Value::String(_) | Value::Impulse => 0.0,
        }
    }

    /// Converts the value to an integer, lossily (floats truncate).
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Bool(b) => i64::from(*b),
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::List(l) => l.first().map_or(0, Value::as_int),
            Value::String(_) | Value::Impulse => 0,
        }
    }

    /// Converts the value to a boolean. Zero and empty values are false.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Impulse => true,
        }
    }

    /// Returns true for `Int` and `Float` values.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// A block of audio-rate samples carried by a signal port.
///
/// Buffers are reused across ticks: writers call [`write_from`](Self::write_from)
/// or fill [`samples_mut`](Self::samples_mut) in place, readers borrow
/// [`samples`](Self::samples). Length is whatever the writer last produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignalBuffer {
    samples: Vec<f32>,
}

impl From<Vec<f32>> for SignalBuffer {
    fn from(samples: Vec<f32>) -> Self {
        Self { samples }
    }
}

impl SignalBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a silent buffer of `len` samples.
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
        }
    }

    /// Borrows the sample block.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mutably borrows the sample block.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Replaces the buffer contents with a copy of `src`, reusing storage.
    pub fn write_from(&mut self, src: &[f32]) {
        self.samples.clear();
        self.samples.extend_from_slice(src);
    }

    /// Resizes the block, zero-filling any new samples.
    pub fn resize(&mut self, len: usize) {
        self.samples.resize(len, 0.0);
    }

    /// Empties the buffer (zero samples, storage kept).
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of samples in the block.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the block holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
