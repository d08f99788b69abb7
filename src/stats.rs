// Copyright (c) 2019, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::partition::*;
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchStats {
  /// Leaf mode decisions run, per square size class (4x4 first)
  pub leaf_evaluations: [usize; CU_SIZE_CLASSES],
  /// Quad split alternatives evaluated, per square size class
  pub split_evaluations: [usize; CU_SIZE_CLASSES],
  /// Nodes whose split evaluation was skipped by a termination rule
  pub early_terminations: usize,
  /// Leaves where a good inter candidate made the intra search unnecessary
  pub intra_prechecks_skipped: usize,
  /// Stores count of pixels belonging to each coding unit size
  pub block_size_counts: BTreeMap<(usize, usize), usize>,
  /// Stores count of pixels belonging to each prediction mode
  pub pred_mode_counts: BTreeMap<PredMode, usize>,
  /// Stores count of pixels belonging to skip coding units
  pub skip_block_count: usize,
}

impl Default for SearchStats {
  fn default() -> Self {
    SearchStats {
      leaf_evaluations: [0; CU_SIZE_CLASSES],
      split_evaluations: [0; CU_SIZE_CLASSES],
      early_terminations: 0,
      intra_prechecks_skipped: 0,
      block_size_counts: BTreeMap::new(),
      pred_mode_counts: BTreeMap::new(),
      skip_block_count: 0,
    }
  }
}

impl SearchStats {
  /// Accounts the visible pixels of a committed coding unit.
  pub fn count_cu(
    &mut self, node: &CodingNode, mode: PredMode, pixels: usize,
  ) {
    *self
      .block_size_counts
      .entry((node.width(), node.height()))
      .or_insert(0) += pixels;
    *self.pred_mode_counts.entry(mode).or_insert(0) += pixels;
    if mode == PredMode::MODE_SKIP {
      self.skip_block_count += pixels;
    }
  }

  /// Total leaf evaluations over all sizes.
  pub fn total_leaf_evaluations(&self) -> usize {
    self.leaf_evaluations.iter().sum()
  }
}

impl Add<&Self> for SearchStats {
  type Output = Self;

  fn add(self, rhs: &SearchStats) -> Self::Output {
    let mut lhs = self;
    lhs += rhs;
    lhs
  }
}

impl AddAssign<&Self> for SearchStats {
  fn add_assign(&mut self, rhs: &SearchStats) {
    for (l, r) in self.leaf_evaluations.iter_mut().zip(rhs.leaf_evaluations) {
      *l += r;
    }
    for (l, r) in
      self.split_evaluations.iter_mut().zip(rhs.split_evaluations)
    {
      *l += r;
    }
    rhs.block_size_counts.iter().for_each(|(&k, &v)| {
      *self.block_size_counts.entry(k).or_insert(0) += v;
    });
    rhs.pred_mode_counts.iter().for_each(|(&k, &v)| {
      *self.pred_mode_counts.entry(k).or_insert(0) += v;
    });
    self.early_terminations += rhs.early_terminations;
    self.intra_prechecks_skipped += rhs.intra_prechecks_skipped;
    self.skip_block_count += rhs.skip_block_count;
  }
}
