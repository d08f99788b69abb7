// Copyright (c) 2020-2021, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::partition::{MAX_CU_LOG2, MIN_CU_LOG2};
use crate::serialize::{Deserialize, Serialize};

use std::fmt;

/// Fastest preset accepted by [`SpeedSettings::from_preset`].
pub const MAX_SPEED: usize = 10;

/// Contains the speed settings.
///
/// Every threshold here trades compression for search time. None of them
/// change what a decoder sees, only which decisions are tried.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedSettings {
  /// Range of square coding unit sizes that can be used. Larger ranges
  /// are slower.
  ///
  /// Nodes straddling the picture edge are split below the range if
  /// needed.
  pub partition_range: PartitionRange,

  /// A skip leaf at or below this size (log2) ends the search of the
  /// node. `0` disables the rule.
  ///
  /// Higher is faster.
  pub skip_split_max_log2: usize,

  /// A skip leaf whose neighbors are mostly skipped and no deeper than
  /// the node ends the search of the node.
  ///
  /// Enabled is faster.
  pub neighbor_skip_termination: bool,

  /// In intra slices, a leaf whose distortion is below `ratio * lambda`
  /// is not split further.
  ///
  /// Higher is faster.
  pub intra_split_dist_ratio: Option<f64>,

  /// Intra prediction is not tried when the best inter candidate has a
  /// luma SATD per pixel at or below this value.
  ///
  /// Higher is faster.
  pub intra_satd_precheck: Option<u32>,
}

impl Default for SpeedSettings {
  /// The default settings are equivalent to speed 0
  fn default() -> Self {
    SpeedSettings {
      partition_range: PartitionRange::new(MIN_CU_LOG2, MAX_CU_LOG2),
      skip_split_max_log2: 3,
      neighbor_skip_termination: true,
      intra_split_dist_ratio: Some(1.),
      intra_satd_precheck: None,
    }
  }
}

impl SpeedSettings {
  /// Set the speed setting according to a numeric speed preset.
  ///
  /// Presets above [`MAX_SPEED`] behave like [`MAX_SPEED`].
  pub fn from_preset(speed: usize) -> Self {
    // The default settings are equivalent to speed 0
    let mut settings = SpeedSettings::default();

    if speed >= 2 {
      settings.intra_satd_precheck = Some(1);
    }

    if speed >= 3 {
      settings.skip_split_max_log2 = 4;
      settings.intra_split_dist_ratio = Some(4.);
    }

    if speed >= 5 {
      settings.partition_range = PartitionRange::new(3, MAX_CU_LOG2);
      settings.intra_satd_precheck = Some(2);
    }

    if speed >= 7 {
      settings.skip_split_max_log2 = 5;
      settings.intra_split_dist_ratio = Some(16.);
    }

    if speed >= 9 {
      settings.partition_range = PartitionRange::new(4, MAX_CU_LOG2);
      settings.intra_satd_precheck = Some(4);
    }

    if speed >= MAX_SPEED {
      settings.partition_range = PartitionRange::new(5, MAX_CU_LOG2);
      settings.skip_split_max_log2 = MAX_CU_LOG2;
    }

    settings
  }

  /// Every size, every mode and no early termination. Slowest; useful as
  /// a reference.
  pub fn exhaustive() -> Self {
    SpeedSettings {
      partition_range: PartitionRange::new(MIN_CU_LOG2, MAX_CU_LOG2),
      skip_split_max_log2: 0,
      neighbor_skip_termination: false,
      intra_split_dist_ratio: None,
      intra_satd_precheck: None,
    }
  }
}

impl fmt::Display for SpeedSettings {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    let opt = |v: Option<String>| v.unwrap_or_else(|| "off".to_owned());
    write!(
      f,
      "partition={} skip_split_max={} neighbor_skip={} intra_split_ratio={} \
       intra_satd_precheck={}",
      self.partition_range,
      self.skip_split_max_log2,
      self.neighbor_skip_termination,
      opt(self.intra_split_dist_ratio.map(|r| r.to_string())),
      opt(self.intra_satd_precheck.map(|t| t.to_string()))
    )
  }
}

/// Range of square coding unit sizes to use, in log2 luma samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRange {
  /// Smallest leaf.
  pub min_log2: usize,
  /// Largest leaf.
  pub max_log2: usize,
}

impl PartitionRange {
  /// Creates a new partition range with min and max partition sizes.
  pub fn new(min_log2: usize, max_log2: usize) -> Self {
    assert!(max_log2 >= min_log2);
    assert!(min_log2 >= MIN_CU_LOG2 && max_log2 <= MAX_CU_LOG2);

    Self { min_log2, max_log2 }
  }
}

impl fmt::Display for PartitionRange {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    let (min, max) = (1 << self.min_log2, 1 << self.max_log2);
    write!(f, "{}x{}..{}x{}", min, min, max, max)
  }
}
