// Copyright (c) 2018-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Bottom-up search of the coding tree.
//!
//! Every node compares coding itself as one leaf against splitting into
//! four and searching the children, for every QP it may use. The entropy
//! and delta QP state are checkpointed on entry and each alternative
//! starts from that checkpoint; siblings chain, each starting from the
//! state its predecessor's winner left behind.

use super::{FrameInvariants, SearchScratch};
use crate::context::neighbor::*;
use crate::context::*;
use crate::partition::*;
use crate::predict::Analyzers;
use crate::quantize::select_qp_range;
use crate::rdo::{compute_rd_cost, rdo_mode_decision};
use crate::tiling::TileState;
use crate::util::*;

/// A split has to beat the leaf by more than this to replace it.
const SPLIT_COST_EPS: f64 = 1e-6;

/// Alternatives a node may evaluate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NodePermissions {
  pub allow_leaf: bool,
  pub allow_split: bool,
}

impl NodePermissions {
  pub const ALL: Self =
    NodePermissions { allow_leaf: true, allow_split: true };
  pub const LEAF_ONLY: Self =
    NodePermissions { allow_leaf: true, allow_split: false };
  pub const SPLIT_ONLY: Self =
    NodePermissions { allow_leaf: false, allow_split: true };
}

impl Default for NodePermissions {
  fn default() -> Self {
    Self::ALL
  }
}

/// Result of searching one node. The decided subtree is left in the best
/// record of the node's size class.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeDecision {
  pub cost: f64,
  pub split: SplitMode,
  /// Delta QP state after coding the decided subtree.
  pub dqp: DqpState,
}

#[inline]
fn open_qp_group(dqp: &mut DqpState, qp: u8, code: u8, opens: bool) {
  if opens {
    dqp.open_group(qp, code);
  } else {
    dqp.cu_qp_delta_code = code;
  }
}

/// Searches `node` and everything below it.
///
/// On return the estimator holds the state after coding the winner, the
/// winner's reconstruction is in the tile frame and its decisions are in
/// the tile maps, marked in progress.
#[profiling::function]
pub fn search_partition<T: Pixel, E: EntropyEstimator>(
  fi: &FrameInvariants, tools: &Analyzers<T>, ts: &mut TileState<'_, T>,
  sc: &mut SearchScratch<T>, est: &mut E, node: &CodingNode, parent_qp: u8,
  dqp: DqpState, perms: NodePermissions,
) -> NodeDecision {
  let (pic_w, pic_h) = (fi.width, fi.height);
  debug_assert!(node.is_in_picture(pic_w, pic_h));
  let speed = &fi.config.speed_settings;
  let size_log2 = node.log2_w.max(node.log2_h);
  let size_idx = size_log2 - MIN_CU_LOG2;

  // Always split if the current node is too large or crosses the picture
  // edge
  let must_split = !node.is_min_size()
    && (node.is_boundary(pic_w, pic_h)
      || size_log2 > speed.partition_range.max_log2);
  let try_leaf = perms.allow_leaf && !must_split;
  let mut try_split = perms.allow_split
    && !node.is_min_size()
    && (must_split || size_log2 > speed.partition_range.min_log2);
  // The split flag is implied unless both options exist.
  let split_flag_coded = !must_split && !node.is_min_size();
  assert!(
    try_leaf || try_split,
    "nothing to evaluate for {}x{} at ({}, {})",
    node.width(),
    node.height(),
    node.x,
    node.y
  );

  let entry = SearchCheckpoint::take(est, dqp);
  ts.maps.clear_region(node);
  let ctx = context_flags(&ts.maps, node);
  let guidance = depth_guidance(&ts.maps, node);

  let mut best_cost = f64::MAX;
  let mut best_split = SplitMode::NO_SPLIT;
  let mut best_exit: Option<SearchCheckpoint<E::State>> = None;
  let mut best_leaf = None;

  if try_leaf {
    let (range, code) = select_qp_range(
      &fi.dqp,
      fi.qp_offsets.as_deref(),
      node,
      SplitMode::NO_SPLIT,
      parent_qp,
      &dqp,
    );
    for qp in range.iter() {
      let mut d = entry.restore(est);
      open_qp_group(&mut d, qp, code, range.is_dqp_set);
      let bits = if split_flag_coded {
        est.estimate_bits(Symbol::SplitFlag { ctx: ctx.split, split: false })
      } else {
        0
      };

      sc.pool.temp_mut(node).init(fi.qp_tables.plane_qps(qp));
      sc.stats.leaf_evaluations[size_idx] += 1;
      sc.serial += 1;
      let decision = rdo_mode_decision(
        fi,
        tools,
        ts,
        &mut sc.rdo,
        &mut sc.stats,
        est,
        node,
        qp,
        &mut d,
        sc.pool.temp_mut(node),
        sc.serial,
      );
      let Some(md) = decision else { continue };

      let cost = md.cost + compute_rd_cost(fi.qp_tables.lambda(qp), 0., bits);
      if cost < best_cost {
        best_cost = cost;
        best_leaf = Some(md);
        best_exit = Some(SearchCheckpoint::take(est, d));
        sc.pool.promote_temp(node);
      }
    }
  }

  if try_split && !must_split {
    if let Some(md) = best_leaf {
      let lambda = fi.qp_tables.lambda(md.qp);
      let skip_small =
        md.skip && size_log2 <= speed.skip_split_max_log2;
      let skip_neighbors = speed.neighbor_skip_termination
        && md.skip
        && guidance.skip_bias()
        && node.depth >= guidance.max_depth;
      let flat_intra = fi.slice_type.is_intra()
        && speed
          .intra_split_dist_ratio
          .map_or(false, |ratio| md.dist < ratio * lambda);
      if skip_small || skip_neighbors || flat_intra {
        try_split = false;
        sc.stats.early_terminations += 1;
        log::trace!(
          "{}x{} at ({}, {}): split skipped (skip {}, intra dist {:.1})",
          node.width(),
          node.height(),
          node.x,
          node.y,
          md.skip,
          md.dist
        );
      }
    }
  }

  if try_split {
    let subsampled = fi.xdec + fi.ydec > 0;
    let child_cons = node.quad_child_cons(subsampled);
    let split = SplitStructure::new(
      node,
      SplitMode::SPLIT_QUAD,
      child_cons,
      pic_w,
      pic_h,
    );
    debug_assert_eq!(split.children.len(), 4);
    // Luma-only children leave the chroma of the node to code here.
    let chroma_cons = TreeCons::new(TreeType::CHROMA, ModeCons::INTRA);
    let chroma_pass = node.tree_cons.has_chroma() && !child_cons.has_chroma();

    let (range, code) = select_qp_range(
      &fi.dqp,
      fi.qp_offsets.as_deref(),
      node,
      SplitMode::SPLIT_QUAD,
      parent_qp,
      &dqp,
    );
    for qp in range.iter() {
      let mut d = entry.restore(est);
      open_qp_group(&mut d, qp, code, range.is_dqp_set);
      let bits = if split_flag_coded {
        est.estimate_bits(Symbol::SplitFlag { ctx: ctx.split, split: true })
      } else {
        0
      };
      let mut cost = compute_rd_cost(fi.qp_tables.lambda(qp), 0., bits);

      ts.maps.clear_region(node);
      sc.pool.temp_mut(node).init(fi.qp_tables.plane_qps(qp));
      sc.stats.split_evaluations[size_idx] += 1;

      for child in split.coded_children() {
        let cd = search_partition(
          fi,
          tools,
          ts,
          sc,
          est,
          &child,
          qp,
          d,
          NodePermissions::ALL,
        );
        cost += cd.cost;
        d = cd.dqp;
        sc.pool.merge_child(node, &child, child_cons);
      }

      if chroma_pass {
        let cnode = node.with_tree_cons(chroma_cons);
        sc.pool.chroma_mut().init(fi.qp_tables.plane_qps(qp));
        sc.serial += 1;
        let decision = rdo_mode_decision(
          fi,
          tools,
          ts,
          &mut sc.rdo,
          &mut sc.stats,
          est,
          &cnode,
          qp,
          &mut d,
          sc.pool.chroma_mut(),
          sc.serial,
        );
        match decision {
          Some(md) => {
            cost += md.cost;
            sc.pool.merge_chroma(node);
          }
          None => cost = f64::MAX,
        }
      }

      sc.pool.temp_mut(node).set_split_mode(node.depth, SplitMode::SPLIT_QUAD);
      log::trace!(
        "{}x{} at ({}, {}) qp {}: split {:.1} vs {:.1}",
        node.width(),
        node.height(),
        node.x,
        node.y,
        qp,
        cost,
        best_cost
      );

      // Recode the full block if it is more efficient
      if cost < best_cost - SPLIT_COST_EPS {
        best_cost = cost;
        best_split = SplitMode::SPLIT_QUAD;
        best_exit = Some(SearchCheckpoint::take(est, d));
        sc.pool.promote_temp(node);
      }
    }
  }

  assert!(
    best_cost < f64::MAX,
    "no decision for {}x{} at ({}, {})",
    node.width(),
    node.height(),
    node.x,
    node.y
  );
  let Some(exit) = best_exit else {
    panic!("no entropy state kept for ({}, {})", node.x, node.y);
  };
  let mut dqp_out = exit.restore(est);
  // The delta QP code mode is scoped to the subtree.
  dqp_out.cu_qp_delta_code = dqp.cu_qp_delta_code;

  let best = sc.pool.best(node);
  best.write_reco(&mut ts.rec, node.x, node.y, node.tree_cons.planes());
  best.commit_to_frame_maps(&mut ts.maps, node.x, node.y, true);

  NodeDecision { cost: best_cost, split: best_split, dqp: dqp_out }
}
