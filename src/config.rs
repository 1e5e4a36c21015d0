//! Conversion options.

/// Default type tag identifying waveform objects.
pub const WAVEFORM_CLASS: &str = "waveform";

/// Reference day for the fractional start ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrdinalEpoch {
    /// Day 1 is 0001-01-01 in the proleptic Gregorian calendar.
    #[default]
    Proleptic,
    /// MATLAB `datenum`: day 1 is 0000-01-01, 366 days before `Proleptic`.
    MatlabDatenum,
}

impl OrdinalEpoch {
    /// Days to subtract from a start ordinal before calendar conversion.
    pub fn offset_days(self) -> i64 {
        match self {
            OrdinalEpoch::Proleptic => 0,
            OrdinalEpoch::MatlabDatenum => 366,
        }
    }
}

/// Options controlling how a MAT file is converted into streams.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Restrict loading to these top-level variables; `None` loads everything.
    pub variable_names: Option<Vec<String>>,
    /// Object class name a variable must carry to be converted.
    pub class_marker: String,
    /// Turn "yes"/"no"/"true"/"false" extra field values into booleans.
    pub normalize_flags: bool,
    pub epoch: OrdinalEpoch,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            variable_names: None,
            class_marker: WAVEFORM_CLASS.to_string(),
            normalize_flags: true,
            epoch: OrdinalEpoch::Proleptic,
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts loading to the given variable names.
    pub fn with_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variable_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_class_marker(mut self, marker: impl Into<String>) -> Self {
        self.class_marker = marker.into();
        self
    }

    pub fn with_normalize_flags(mut self, enabled: bool) -> Self {
        self.normalize_flags = enabled;
        self
    }

    pub fn with_epoch(mut self, epoch: OrdinalEpoch) -> Self {
        self.epoch = epoch;
        self
    }
}
