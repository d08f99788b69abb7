// Copyright (c) 2017-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_camel_case_types)]
#![allow(dead_code)]

use crate::serialize::{Deserialize, Serialize};
use arrayvec::ArrayVec;

/// log2 of the smallest coding unit (the 4x4 "SCU").
pub const MIN_CU_LOG2: usize = 2;
/// log2 of the largest coding tree unit.
pub const MAX_CU_LOG2: usize = 7;
pub const MIN_CU_SIZE: usize = 1 << MIN_CU_LOG2;
pub const MAX_CU_SIZE: usize = 1 << MAX_CU_LOG2;
/// Number of distinct log2 sizes per dimension, 4 through 128.
pub const CU_SIZE_CLASSES: usize = MAX_CU_LOG2 - MIN_CU_LOG2 + 1;
/// Deepest quad-tree depth plus one.
pub const MAX_CU_DEPTH: usize = CU_SIZE_CLASSES;
/// Largest transform, in log2 luma samples.
pub const MAX_TR_LOG2: usize = 6;
/// Number of sub transform blocks a coding unit may be divided into.
pub const MAX_SUB_TB_NUM: usize = 4;

pub const PLANES: usize = 3;

pub const REFP_0: usize = 0;
pub const REFP_1: usize = 1;
pub const REFP_NUM: usize = 2;
/// Reference index of an unused prediction list.
pub const REFI_INVALID: i8 = -1;

#[derive(
  Copy,
  Clone,
  Debug,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
pub enum SplitMode {
  #[default]
  NO_SPLIT,
  SPLIT_QUAD,
}

#[derive(
  Copy,
  Clone,
  Debug,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
pub enum PredMode {
  #[default]
  MODE_INTRA,
  MODE_INTER,
  MODE_SKIP,
  MODE_IBC,
}

impl PredMode {
  pub const fn is_intra(self) -> bool {
    matches!(self, PredMode::MODE_INTRA)
  }

  /// Whether the block predicts from another picture.
  pub const fn is_inter(self) -> bool {
    matches!(self, PredMode::MODE_INTER | PredMode::MODE_SKIP)
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceType {
  I,
  P,
  B,
}

impl SliceType {
  pub const fn is_intra(self) -> bool {
    matches!(self, SliceType::I)
  }
}

/// Which prediction families a coding unit may use.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModeCons {
  #[default]
  ALL,
  INTRA,
}

/// Which components a coding unit carries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TreeType {
  #[default]
  LUMA_CHROMA,
  LUMA,
  CHROMA,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TreeCons {
  pub tree_type: TreeType,
  pub mode_cons: ModeCons,
}

impl TreeCons {
  pub const fn new(tree_type: TreeType, mode_cons: ModeCons) -> Self {
    TreeCons { tree_type, mode_cons }
  }

  pub const fn has_luma(self) -> bool {
    !matches!(self.tree_type, TreeType::CHROMA)
  }

  pub const fn has_chroma(self) -> bool {
    !matches!(self.tree_type, TreeType::LUMA)
  }

  pub const fn allows_inter(self) -> bool {
    matches!(self.mode_cons, ModeCons::ALL) && self.has_luma()
  }

  /// Planes covered by this constraint, as an index range.
  pub fn planes(self) -> std::ops::Range<usize> {
    match self.tree_type {
      TreeType::LUMA_CHROMA => 0..PLANES,
      TreeType::LUMA => 0..1,
      TreeType::CHROMA => 1..PLANES,
    }
  }
}

/// Motion vector in quarter-pel luma units.
#[derive(
  Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct MotionVector {
  pub row: i16,
  pub col: i16,
}

impl MotionVector {
  pub const fn quantize_to_fullpel(self) -> Self {
    Self { row: (self.row / 4) * 4, col: (self.col / 4) * 4 }
  }

  pub const fn is_zero(self) -> bool {
    self.row == 0 && self.col == 0
  }

  /// Largest absolute component difference.
  pub fn max_diff(self, other: Self) -> u16 {
    let dr = (self.row as i32 - other.row as i32).unsigned_abs();
    let dc = (self.col as i32 - other.col as i32).unsigned_abs();
    dr.max(dc) as u16
  }
}

impl std::ops::Sub for MotionVector {
  type Output = MotionVector;

  fn sub(self, rhs: MotionVector) -> MotionVector {
    MotionVector {
      row: self.row.saturating_sub(rhs.row),
      col: self.col.saturating_sub(rhs.col),
    }
  }
}

/// A square or rectangular region visited by the coding-tree search.
///
/// Positions are in luma samples relative to the picture. `cup` is the
/// z-scan index of the node's top-left 4x4 unit inside its CTU.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CodingNode {
  pub x: usize,
  pub y: usize,
  pub log2_w: usize,
  pub log2_h: usize,
  pub depth: usize,
  pub cup: usize,
  pub tree_cons: TreeCons,
}

impl CodingNode {
  pub const fn root(x: usize, y: usize, log2_ctu: usize) -> Self {
    CodingNode {
      x,
      y,
      log2_w: log2_ctu,
      log2_h: log2_ctu,
      depth: 0,
      cup: 0,
      tree_cons: TreeCons::new(TreeType::LUMA_CHROMA, ModeCons::ALL),
    }
  }

  #[inline]
  pub const fn width(&self) -> usize {
    1 << self.log2_w
  }

  #[inline]
  pub const fn height(&self) -> usize {
    1 << self.log2_h
  }

  #[inline]
  pub const fn area(&self) -> usize {
    self.width() * self.height()
  }

  /// Index of this node's size class in per-size tables.
  #[inline]
  pub const fn size_class(&self) -> (usize, usize) {
    (self.log2_w - MIN_CU_LOG2, self.log2_h - MIN_CU_LOG2)
  }

  pub const fn is_min_size(&self) -> bool {
    self.log2_w <= MIN_CU_LOG2 && self.log2_h <= MIN_CU_LOG2
  }

  /// The region extends past the right or bottom picture edge.
  pub const fn is_boundary(&self, pic_w: usize, pic_h: usize) -> bool {
    self.x + self.width() > pic_w || self.y + self.height() > pic_h
  }

  pub const fn is_in_picture(&self, pic_w: usize, pic_h: usize) -> bool {
    self.x < pic_w && self.y < pic_h
  }

  /// Visible width and height once clipped to the picture.
  pub fn clipped_size(&self, pic_w: usize, pic_h: usize) -> (usize, usize) {
    (
      self.width().min(pic_w.saturating_sub(self.x)),
      self.height().min(pic_h.saturating_sub(self.y)),
    )
  }

  pub const fn with_tree_cons(self, tree_cons: TreeCons) -> Self {
    CodingNode { tree_cons, ..self }
  }

  /// Tree constraint the four quad children of this node must honor.
  ///
  /// 4x4 blocks are intra only. With subsampled chroma the 2x2 chroma
  /// blocks cannot be coded, so the children carry luma alone and the
  /// chroma of the whole node is coded once at this level.
  pub fn quad_child_cons(&self, chroma_subsampled: bool) -> TreeCons {
    let child_log2_w = self.log2_w - 1;
    let child_log2_h = self.log2_h - 1;
    if child_log2_w > MIN_CU_LOG2 || child_log2_h > MIN_CU_LOG2 {
      return self.tree_cons;
    }
    let tree_type = if chroma_subsampled && self.tree_cons.has_luma() {
      TreeType::LUMA
    } else {
      self.tree_cons.tree_type
    };
    TreeCons::new(tree_type, ModeCons::INTRA)
  }
}

/// Children produced by a split, in coding order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitStructure {
  pub mode: SplitMode,
  pub children: ArrayVec<CodingNode, 4>,
  pic_w: usize,
  pic_h: usize,
}

impl SplitStructure {
  pub fn new(
    node: &CodingNode, mode: SplitMode, child_cons: TreeCons, pic_w: usize,
    pic_h: usize,
  ) -> Self {
    let mut children = ArrayVec::new();
    if mode == SplitMode::SPLIT_QUAD {
      debug_assert!(node.log2_w > MIN_CU_LOG2 && node.log2_h > MIN_CU_LOG2);
      let log2_w = node.log2_w - 1;
      let log2_h = node.log2_h - 1;
      let cup_step = 1 << (log2_w + log2_h - 2 * MIN_CU_LOG2);
      for i in 0..4 {
        children.push(CodingNode {
          x: node.x + ((i & 1) << log2_w),
          y: node.y + ((i >> 1) << log2_h),
          log2_w,
          log2_h,
          depth: node.depth + 1,
          cup: node.cup + i * cup_step,
          tree_cons: child_cons,
        });
      }
      debug_assert_eq!(
        children.iter().map(CodingNode::area).sum::<usize>(),
        node.area()
      );
    }
    SplitStructure { mode, children, pic_w, pic_h }
  }

  /// Children whose top-left corner lies inside the picture, in raster
  /// order. Children entirely outside are not coded.
  pub fn coded_children(&self) -> impl Iterator<Item = CodingNode> + '_ {
    let (pic_w, pic_h) = (self.pic_w, self.pic_h);
    self
      .children
      .iter()
      .copied()
      .filter(move |c| c.is_in_picture(pic_w, pic_h))
  }
}
