// Copyright (c) 2017-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Read-only queries over already coded neighbors of a block.
//!
//! All queries go through tile-scoped [`FrameMaps`], so a neighbor in
//! another tile, outside the picture or not yet decided is unavailable.

use crate::frame::*;
use crate::partition::*;

pub const AVAIL_UP: u16 = 1 << 0;
pub const AVAIL_LE: u16 = 1 << 1;
pub const AVAIL_RI: u16 = 1 << 3;
pub const AVAIL_LO: u16 = 1 << 4;
pub const AVAIL_UP_LE: u16 = 1 << 5;
pub const AVAIL_UP_RI: u16 = 1 << 6;
pub const AVAIL_LO_LE: u16 = 1 << 7;
pub const AVAIL_LO_RI: u16 = 1 << 8;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NeighborKind {
  /// Neighbor samples for intra prediction.
  Intra { constrained: bool },
  /// Neighbor motion for inter prediction.
  Inter,
}

#[inline]
fn scu_origin(node: &CodingNode) -> (isize, isize, isize, isize) {
  (
    (node.x >> MIN_CU_LOG2) as isize,
    (node.y >> MIN_CU_LOG2) as isize,
    (node.width() >> MIN_CU_LOG2) as isize,
    (node.height() >> MIN_CU_LOG2) as isize,
  )
}

/// Bit mask of the `AVAIL_*` neighbors of `node` usable for `kind`.
pub fn availability(
  maps: &FrameMaps, node: &CodingNode, kind: NeighborKind,
) -> u16 {
  let (x, y, w, h) = scu_origin(node);
  let positions = [
    (AVAIL_UP, x, y - 1),
    (AVAIL_LE, x - 1, y),
    (AVAIL_RI, x + w, y),
    (AVAIL_LO, x, y + h),
    (AVAIL_UP_LE, x - 1, y - 1),
    (AVAIL_UP_RI, x + w, y - 1),
    (AVAIL_LO_LE, x - 1, y + h),
    (AVAIL_LO_RI, x + w, y + h),
  ];

  positions.iter().fold(0, |mask, &(bit, px, py)| {
    let flags = maps.flags(px, py);
    let usable = flags & SCU_CODED != 0
      && match kind {
        NeighborKind::Inter => flags & (SCU_INTRA | SCU_IBC) == 0,
        NeighborKind::Intra { constrained } => {
          !constrained || flags & SCU_INTRA != 0
        }
      };
    if usable {
      mask | bit
    } else {
      mask
    }
  })
}

/// Context indices derived from the left and above neighbors.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextFlags {
  /// Neighbors coded at a deeper depth than the block.
  pub split: usize,
  pub skip: usize,
  pub pred_mode: usize,
  pub ibc: usize,
  pub affine: usize,
}

pub fn context_flags(maps: &FrameMaps, node: &CodingNode) -> ContextFlags {
  let (x, y, _, _) = scu_origin(node);
  let mut ctx = ContextFlags::default();

  for (px, py) in [(x - 1, y), (x, y - 1)] {
    let Some(i) = maps.idx(px, py) else { continue };
    let flags = maps.scu[i];
    if flags & SCU_CODED == 0 {
      continue;
    }
    ctx.split += (maps.depth[i] as usize > node.depth) as usize;
    ctx.skip += (flags & SCU_SKIP != 0) as usize;
    ctx.pred_mode += (flags & SCU_INTRA != 0) as usize;
    ctx.ibc += (flags & SCU_IBC != 0) as usize;
    ctx.affine += (flags & SCU_AFFINE != 0) as usize;
  }

  ctx
}

/// Depth range and skip statistics of the coded neighbors of a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DepthGuidance {
  pub min_depth: usize,
  pub max_depth: usize,
  pub neighbors: usize,
  pub skip_neighbors: usize,
}

impl DepthGuidance {
  pub const fn is_available(&self) -> bool {
    self.neighbors > 0
  }

  /// Most of the coded neighbors were coded as skip.
  pub const fn skip_bias(&self) -> bool {
    self.neighbors > 0 && 2 * self.skip_neighbors > self.neighbors
  }
}

/// Summarizes the left, above, above-left and above-right neighbors.
pub fn depth_guidance(maps: &FrameMaps, node: &CodingNode) -> DepthGuidance {
  let (x, y, w, _) = scu_origin(node);
  let mut g = DepthGuidance {
    min_depth: MAX_CU_DEPTH - 1,
    max_depth: 0,
    neighbors: 0,
    skip_neighbors: 0,
  };

  for (px, py) in [(x - 1, y), (x, y - 1), (x - 1, y - 1), (x + w, y - 1)] {
    let Some(i) = maps.idx(px, py) else { continue };
    if maps.scu[i] & SCU_CODED == 0 {
      continue;
    }
    let d = maps.depth[i] as usize;
    g.min_depth = g.min_depth.min(d);
    g.max_depth = g.max_depth.max(d);
    g.neighbors += 1;
    g.skip_neighbors += (maps.scu[i] & SCU_SKIP != 0) as usize;
  }

  if g.neighbors == 0 {
    g.min_depth = 0;
    g.max_depth = MAX_CU_DEPTH - 1;
  }
  g
}

#[cfg(test)]
mod test {
  use super::*;

  fn node(x: usize, y: usize, log2: usize, depth: usize) -> CodingNode {
    CodingNode {
      x,
      y,
      log2_w: log2,
      log2_h: log2,
      depth,
      ..CodingNode::root(0, 0, 6)
    }
  }

  fn mark(maps: &mut FrameMaps, x: usize, y: usize, flags: u32, depth: u8) {
    let i = maps.idx(x as isize, y as isize).unwrap();
    maps.scu[i] = flags;
    maps.depth[i] = depth;
  }

  #[test]
  fn nothing_coded_nothing_available() {
    let maps = FrameMaps::for_picture(64, 64);
    let n = node(16, 16, 4, 2);
    assert_eq!(availability(&maps, &n, NeighborKind::Inter), 0);
    assert_eq!(context_flags(&maps, &n), ContextFlags::default());
    assert!(!depth_guidance(&maps, &n).is_available());
  }

  #[test]
  fn availability_bits_follow_positions() {
    let mut maps = FrameMaps::for_picture(64, 64);
    let n = node(16, 16, 4, 2);
    mark(&mut maps, 3, 4, SCU_CODED, 2);
    mark(&mut maps, 4, 3, SCU_CODED | SCU_INTRA, 2);
    mark(&mut maps, 8, 3, SCU_CODED, 2);
    mark(&mut maps, 3, 8, SCU_CODED | SCU_INTRA, 2);

    let intra =
      availability(&maps, &n, NeighborKind::Intra { constrained: false });
    assert_eq!(intra, AVAIL_LE | AVAIL_UP | AVAIL_UP_RI | AVAIL_LO_LE);

    let inter = availability(&maps, &n, NeighborKind::Inter);
    assert_eq!(inter, AVAIL_LE | AVAIL_UP_RI);

    let cip =
      availability(&maps, &n, NeighborKind::Intra { constrained: true });
    assert_eq!(cip, AVAIL_UP | AVAIL_LO_LE);
  }

  #[test]
  fn tile_boundary_blocks_neighbors() {
    let mut tile = FrameMaps::new(8, 0, 8, 16);
    tile.scu.fill(SCU_CODED);
    let n = node(32, 16, 4, 2);
    let mask = availability(&tile, &n, NeighborKind::Inter);
    assert_eq!(mask & (AVAIL_LE | AVAIL_UP_LE | AVAIL_LO_LE), 0);
    assert_ne!(mask & AVAIL_UP, 0);
  }

  #[test]
  fn context_counts_left_and_above() {
    let mut maps = FrameMaps::for_picture(64, 64);
    let n = node(16, 16, 4, 2);
    mark(&mut maps, 3, 4, SCU_CODED | SCU_SKIP, 3);
    mark(&mut maps, 4, 3, SCU_CODED | SCU_INTRA, 2);
    let ctx = context_flags(&maps, &n);
    assert_eq!(
      ctx,
      ContextFlags { split: 1, skip: 1, pred_mode: 1, ibc: 0, affine: 0 }
    );
  }

  #[test]
  fn guidance_summarizes_neighbors() {
    let mut maps = FrameMaps::for_picture(64, 64);
    let n = node(16, 16, 4, 2);
    mark(&mut maps, 3, 4, SCU_CODED | SCU_SKIP, 1);
    mark(&mut maps, 4, 3, SCU_CODED | SCU_SKIP, 3);
    mark(&mut maps, 3, 3, SCU_CODED, 2);
    let g = depth_guidance(&maps, &n);
    assert_eq!((g.min_depth, g.max_depth), (1, 3));
    assert_eq!((g.neighbors, g.skip_neighbors), (3, 2));
    assert!(g.skip_bias());
  }
}
