// Copyright (c) 2018-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::context::neighbor::*;
use crate::dist::get_ssd;
use crate::frame::*;
use crate::partition::*;
use crate::tiling::TileFrame;
use crate::util::*;

use std::ops::Range;

/// Width in luma samples of the neighbor band included around a block.
pub const DBF_BAND: usize = 4;
/// Edges are filtered on this grid, in samples of each plane.
const DBF_GRID_LOG2: usize = 3;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterDirection {
  /// Filter across vertical edges.
  Vertical,
  /// Filter across horizontal edges.
  Horizontal,
}

/// A window of one plane, in that plane's picture coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkPlane<T> {
  pub x0: usize,
  pub y0: usize,
  pub w: usize,
  pub h: usize,
  pub xdec: usize,
  pub ydec: usize,
  pub data: Vec<T>,
}

impl<T> Default for WorkPlane<T> {
  fn default() -> Self {
    WorkPlane { x0: 0, y0: 0, w: 0, h: 0, xdec: 0, ydec: 0, data: Vec::new() }
  }
}

impl<T: Pixel> WorkPlane<T> {
  #[inline]
  pub fn at(&self, x: usize, y: usize) -> T {
    self.data[(y - self.y0) * self.w + x - self.x0]
  }

  #[inline]
  pub fn set(&mut self, x: usize, y: usize, v: T) {
    self.data[(y - self.y0) * self.w + x - self.x0] = v;
  }
}

/// Maps entries overwritten while a candidate is installed.
#[derive(Clone, Debug, Default)]
struct MapsBackup {
  scu: Vec<u32>,
  mv: Vec<[MotionVector; REFP_NUM]>,
  refi: Vec<[i8; REFP_NUM]>,
  qp: Vec<u8>,
}

/// Reusable scratch for [`delta_distortion`].
#[derive(Clone, Debug)]
pub struct DeblockWork<T> {
  pub planes: [WorkPlane<T>; PLANES],
  backup: MapsBackup,
}

impl<T: Pixel> DeblockWork<T> {
  pub fn new() -> Self {
    DeblockWork {
      planes: [
        WorkPlane::default(),
        WorkPlane::default(),
        WorkPlane::default(),
      ],
      backup: MapsBackup::default(),
    }
  }
}

/// Deblocking filter applied to a working window.
///
/// Implementations read coding decisions (edges, boundary strength, QP)
/// from `maps`, which hold the candidate under evaluation.
pub trait DeblockFilter<T: Pixel>: Send + Sync {
  fn filter(
    &self, work: &mut DeblockWork<T>, planes: Range<usize>, maps: &FrameMaps,
    dir: FilterDirection, bit_depth: usize,
  );
}

/// Coding decisions of a candidate, as the filter needs to see them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProvisionalCu {
  pub flags: u32,
  pub mv: [MotionVector; REFP_NUM],
  pub refi: [i8; REFP_NUM],
  pub qp: u8,
}

/// Change in distortion the deblocking filter causes when `node` is coded
/// with the candidate samples `reco`, per plane.
///
/// The block plus the available left, top and right neighbor bands are
/// copied into `work`, the candidate's flags are temporarily installed in
/// `maps` and the filter runs vertical then horizontal edges. `maps` is
/// restored before returning.
pub fn delta_distortion<T: Pixel>(
  enabled: bool, filter: &dyn DeblockFilter<T>, work: &mut DeblockWork<T>,
  maps: &mut FrameMaps, rec: &TileFrame<T>, src: &Frame<T>,
  node: &CodingNode, reco: &[Vec<T>; PLANES], cu: &ProvisionalCu,
  planes: Range<usize>, bit_depth: usize,
) -> [i64; PLANES] {
  let mut delta = [0i64; PLANES];
  if !enabled {
    return delta;
  }

  let avail =
    availability(maps, node, NeighborKind::Intra { constrained: false });

  for p in planes.clone() {
    load_window(&mut work.planes[p], p, node, avail, rec, &reco[p]);
  }
  let before = window_ssd(work, src, planes.clone());

  install(&mut work.backup, maps, node, cu);
  for dir in [FilterDirection::Vertical, FilterDirection::Horizontal] {
    filter.filter(work, planes.clone(), maps, dir, bit_depth);
  }
  restore(&work.backup, maps, node);

  let after = window_ssd(work, src, planes.clone());
  for p in planes {
    delta[p] = after[p] as i64 - before[p] as i64;
  }
  delta
}

fn load_window<T: Pixel>(
  wp: &mut WorkPlane<T>, p: usize, node: &CodingNode, avail: u16,
  rec: &TileFrame<T>, reco: &[T],
) {
  let (xdec, ydec) = rec.decimation(p);
  let (bx, by) = (node.x >> xdec, node.y >> ydec);
  let (bw, bh) = (node.width() >> xdec, node.height() >> ydec);
  let band_x = DBF_BAND >> xdec;
  let band_y = DBF_BAND >> ydec;

  let left = if avail & AVAIL_LE != 0 { band_x.min(bx) } else { 0 };
  let top = if avail & AVAIL_UP != 0 { band_y.min(by) } else { 0 };
  let right = if avail & AVAIL_RI != 0 { band_x } else { 0 };

  wp.x0 = bx - left;
  wp.y0 = by - top;
  wp.w = left + bw + right;
  wp.h = top + bh;
  wp.xdec = xdec;
  wp.ydec = ydec;
  wp.data.clear();
  for y in wp.y0..wp.y0 + wp.h {
    for x in wp.x0..wp.x0 + wp.w {
      let inside = x >= bx && x < bx + bw && y >= by;
      wp.data.push(if inside {
        reco[(y - by) * bw + x - bx]
      } else {
        rec.p(p, x, y)
      });
    }
  }
}

fn window_ssd<T: Pixel>(
  work: &DeblockWork<T>, src: &Frame<T>, planes: Range<usize>,
) -> [u64; PLANES] {
  let mut ssd = [0u64; PLANES];
  for p in planes {
    let wp = &work.planes[p];
    let (org, stride) = src.block(p, wp.x0, wp.y0);
    ssd[p] = get_ssd(org, stride, &wp.data, wp.w, wp.w, wp.h);
  }
  ssd
}

fn install(
  backup: &mut MapsBackup, maps: &mut FrameMaps, node: &CodingNode,
  cu: &ProvisionalCu,
) {
  backup.scu.clear();
  backup.mv.clear();
  backup.refi.clear();
  backup.qp.clear();
  let Some((x, y, w, h)) = maps.clip_node(node) else { return };
  for row in y..y + h {
    let r = row * maps.w_scu + x..row * maps.w_scu + x + w;
    backup.scu.extend_from_slice(&maps.scu[r.clone()]);
    backup.mv.extend_from_slice(&maps.mv[r.clone()]);
    backup.refi.extend_from_slice(&maps.refi[r.clone()]);
    backup.qp.extend_from_slice(&maps.qp[r.clone()]);
    maps.scu[r.clone()].fill(cu.flags | SCU_CODED | SCU_IN_PROGRESS);
    maps.mv[r.clone()].fill(cu.mv);
    maps.refi[r.clone()].fill(cu.refi);
    maps.qp[r].fill(cu.qp);
  }
}

fn restore(backup: &MapsBackup, maps: &mut FrameMaps, node: &CodingNode) {
  let Some((x, y, w, h)) = maps.clip_node(node) else { return };
  let stride = maps.w_scu;
  copy_rect(&mut maps.scu, stride, x, y, &backup.scu, w, 0, 0, w, h);
  copy_rect(&mut maps.mv, stride, x, y, &backup.mv, w, 0, 0, w, h);
  copy_rect(&mut maps.refi, stride, x, y, &backup.refi, w, 0, 0, w, h);
  copy_rect(&mut maps.qp, stride, x, y, &backup.qp, w, 0, 0, w, h);
}

/// Boundary strength between two 4x4 units given in picture SCU
/// coordinates: 2 next to intra, 1 next to residual or a motion
/// discontinuity, 0 otherwise or when either side is not coded.
fn boundary_strength(
  maps: &FrameMaps, p: (isize, isize), q: (isize, isize),
) -> u8 {
  let (Some(i), Some(j)) = (maps.idx(p.0, p.1), maps.idx(q.0, q.1)) else {
    return 0;
  };
  let (fp, fq) = (maps.scu[i], maps.scu[j]);
  if fp & SCU_CODED == 0 || fq & SCU_CODED == 0 {
    0
  } else if (fp | fq) & SCU_INTRA != 0 {
    2
  } else if (fp | fq) & SCU_CBF_LUMA != 0 {
    1
  } else if maps.refi[i] != maps.refi[j]
    || (0..REFP_NUM).any(|l| maps.mv[i][l].max_diff(maps.mv[j][l]) >= 4)
  {
    1
  } else {
    0
  }
}

/// Short normal-strength filter over a regular 8-sample grid.
#[derive(Copy, Clone, Debug, Default)]
pub struct SimpleDeblockFilter;

impl SimpleDeblockFilter {
  /// Filters the four samples `s[0..4]` = p1, p0, q0, q1 in place.
  #[inline]
  fn filter_edge(s: &mut [i32; 4], bs: u8, qp: u8, bit_depth: usize) {
    let beta = ((qp as i32 - 16).max(0) * 2) << (bit_depth - 8);
    let alpha = 2 * beta;
    let [p1, p0, q0, q1] = *s;
    if (p0 - q0).abs() >= alpha
      || (p1 - p0).abs() >= beta
      || (q1 - q0).abs() >= beta
    {
      return;
    }
    let tc = (bs as i32 + 1) << (bit_depth - 8);
    let d = clamp(((q0 - p0) * 4 + (p1 - q1) + 4) >> 3, -tc, tc);
    let max = (1 << bit_depth) - 1;
    s[1] = clamp(p0 + d, 0, max);
    s[2] = clamp(q0 - d, 0, max);
  }
}

impl<T: Pixel> DeblockFilter<T> for SimpleDeblockFilter {
  fn filter(
    &self, work: &mut DeblockWork<T>, planes: Range<usize>, maps: &FrameMaps,
    dir: FilterDirection, bit_depth: usize,
  ) {
    let grid = 1 << DBF_GRID_LOG2;
    for p in planes {
      let wp = &mut work.planes[p];
      let (xdec, ydec) = (wp.xdec, wp.ydec);
      let scu = |x: usize, y: usize| {
        (
          ((x << xdec) >> MIN_CU_LOG2) as isize,
          ((y << ydec) >> MIN_CU_LOG2) as isize,
        )
      };
      // Chroma is only filtered next to intra blocks.
      let min_bs = if p == 0 { 1 } else { 2 };

      match dir {
        FilterDirection::Vertical => {
          let first = (wp.x0 + 2).next_multiple_of(grid);
          for xe in (first..wp.x0 + wp.w - 1).step_by(grid) {
            for y in wp.y0..wp.y0 + wp.h {
              let (pq, qq) = (scu(xe - 1, y), scu(xe, y));
              let bs = boundary_strength(maps, pq, qq);
              if bs < min_bs {
                continue;
              }
              let qp = qp_avg(maps, pq, qq);
              let mut s = [0i32; 4];
              for (k, v) in s.iter_mut().enumerate() {
                *v = i32::cast_from(wp.at(xe + k - 2, y));
              }
              Self::filter_edge(&mut s, bs, qp, bit_depth);
              wp.set(xe - 1, y, T::cast_from(s[1]));
              wp.set(xe, y, T::cast_from(s[2]));
            }
          }
        }
        FilterDirection::Horizontal => {
          let first = (wp.y0 + 2).next_multiple_of(grid);
          for ye in (first..wp.y0 + wp.h - 1).step_by(grid) {
            for x in wp.x0..wp.x0 + wp.w {
              let (pq, qq) = (scu(x, ye - 1), scu(x, ye));
              let bs = boundary_strength(maps, pq, qq);
              if bs < min_bs {
                continue;
              }
              let qp = qp_avg(maps, pq, qq);
              let mut s = [0i32; 4];
              for (k, v) in s.iter_mut().enumerate() {
                *v = i32::cast_from(wp.at(x, ye + k - 2));
              }
              Self::filter_edge(&mut s, bs, qp, bit_depth);
              wp.set(x, ye - 1, T::cast_from(s[1]));
              wp.set(x, ye, T::cast_from(s[2]));
            }
          }
        }
      }
    }
  }
}

fn qp_avg(maps: &FrameMaps, p: (isize, isize), q: (isize, isize)) -> u8 {
  let qp = |(x, y)| maps.idx(x, y).map_or(0, |i| maps.qp[i] as u32);
  ((qp(p) + qp(q) + 1) >> 1) as u8
}
