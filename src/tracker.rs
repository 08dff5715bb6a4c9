//! Closed set of feature-tracking strategies and their bound configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Detector {
    ShiTomasi,
    Fast,
    Orb,
    Brisk,
    Akaze,
    Sift,
    RootSift,
    Surf,
    SuperPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Descriptor {
    /// Optical-flow tracking, no descriptor.
    None,
    Orb,
    Brisk,
    Akaze,
    Freak,
    Sift,
    RootSift,
    Surf,
    SuperPoint,
    Tfeat,
}

/// How correspondences between consecutive frames are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackerKind {
    LucasKanade,
    DescriptorMatching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Matcher {
    None,
    BruteForce,
    Flann,
}

/// Supported feature-tracking strategies, resolved at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TrackerStrategy {
    LkShiTomasi,
    LkFast,
    ShiTomasiOrb,
    FastOrb,
    Orb,
    Brisk,
    Akaze,
    FastFreak,
    Sift,
    RootSift,
    Surf,
    SuperPoint,
    FastTfeat,
}

impl TrackerStrategy {
    pub const ALL: [TrackerStrategy; 13] = [
        Self::LkShiTomasi,
        Self::LkFast,
        Self::ShiTomasiOrb,
        Self::FastOrb,
        Self::Orb,
        Self::Brisk,
        Self::Akaze,
        Self::FastFreak,
        Self::Sift,
        Self::RootSift,
        Self::Surf,
        Self::SuperPoint,
        Self::FastTfeat,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::LkShiTomasi => "LK_SHI_TOMASI",
            Self::LkFast => "LK_FAST",
            Self::ShiTomasiOrb => "SHI_TOMASI_ORB",
            Self::FastOrb => "FAST_ORB",
            Self::Orb => "ORB",
            Self::Brisk => "BRISK",
            Self::Akaze => "AKAZE",
            Self::FastFreak => "FAST_FREAK",
            Self::Sift => "SIFT",
            Self::RootSift => "ROOT_SIFT",
            Self::Surf => "SURF",
            Self::SuperPoint => "SUPERPOINT",
            Self::FastTfeat => "FAST_TFEAT",
        }
    }

    pub fn detector(self) -> Detector {
        match self {
            Self::LkShiTomasi | Self::ShiTomasiOrb => Detector::ShiTomasi,
            Self::LkFast | Self::FastOrb | Self::FastFreak | Self::FastTfeat => Detector::Fast,
            Self::Orb => Detector::Orb,
            Self::Brisk => Detector::Brisk,
            Self::Akaze => Detector::Akaze,
            Self::Sift => Detector::Sift,
            Self::RootSift => Detector::RootSift,
            Self::Surf => Detector::Surf,
            Self::SuperPoint => Detector::SuperPoint,
        }
    }

    pub fn descriptor(self) -> Descriptor {
        match self {
            Self::LkShiTomasi | Self::LkFast => Descriptor::None,
            Self::ShiTomasiOrb | Self::FastOrb | Self::Orb => Descriptor::Orb,
            Self::Brisk => Descriptor::Brisk,
            Self::Akaze => Descriptor::Akaze,
            Self::FastFreak => Descriptor::Freak,
            Self::Sift => Descriptor::Sift,
            Self::RootSift => Descriptor::RootSift,
            Self::Surf => Descriptor::Surf,
            Self::SuperPoint => Descriptor::SuperPoint,
            Self::FastTfeat => Descriptor::Tfeat,
        }
    }

    pub fn kind(self) -> TrackerKind {
        match self.descriptor() {
            Descriptor::None => TrackerKind::LucasKanade,
            _ => TrackerKind::DescriptorMatching,
        }
    }

    pub fn matcher(self) -> Matcher {
        match self.descriptor() {
            Descriptor::None => Matcher::None,
            // float descriptors
            Descriptor::Sift
            | Descriptor::RootSift
            | Descriptor::Surf
            | Descriptor::SuperPoint
            | Descriptor::Tfeat => Matcher::Flann,
            _ => Matcher::BruteForce,
        }
    }

    pub fn default_ratio_test(self) -> f64 {
        match self.kind() {
            TrackerKind::LucasKanade => 1.0,
            TrackerKind::DescriptorMatching => 0.7,
        }
    }
}

impl fmt::Display for TrackerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TrackerStrategy {
    type Err = VoError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == wanted)
            .ok_or_else(|| VoError::config(format!("unknown tracker strategy '{s}'")))
    }
}

impl TryFrom<String> for TrackerStrategy {
    type Error = VoError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TrackerStrategy> for String {
    fn from(value: TrackerStrategy) -> Self {
        value.name().to_string()
    }
}

/// A tracking strategy bound to its parameters. Immutable once handed to an
/// estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub strategy: TrackerStrategy,
    pub num_features: usize,
    /// Lowe ratio for descriptor matching; 1.0 disables the test.
    pub ratio_test: f64,
}

impl TrackerConfig {
    pub fn new(strategy: TrackerStrategy, num_features: usize) -> Self {
        Self {
            strategy,
            num_features,
            ratio_test: strategy.default_ratio_test(),
        }
    }

    pub fn with_ratio_test(mut self, ratio_test: f64) -> Self {
        self.ratio_test = ratio_test;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_features == 0 {
            return Err(VoError::config(format!(
                "{}: num_features must be > 0",
                self.strategy
            )));
        }
        if !(self.ratio_test > 0.0 && self.ratio_test <= 1.0) {
            return Err(VoError::config(format!(
                "{}: ratio_test must be in (0, 1]",
                self.strategy
            )));
        }
        Ok(())
    }

    /// Two configs are interchangeable when they track with the same strategy.
    pub fn same_strategy(&self, other: &TrackerConfig) -> bool {
        self.strategy == other.strategy
    }
}

impl From<TrackerStrategy> for TrackerConfig {
    fn from(strategy: TrackerStrategy) -> Self {
        Self::new(strategy, 2000)
    }
}
