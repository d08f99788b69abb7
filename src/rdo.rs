// Copyright (c) 2017-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::context::neighbor::*;
use crate::context::*;
use crate::deblock::*;
use crate::dist::get_ssd;
use crate::encoder::cu_data::CuData;
use crate::encoder::FrameInvariants;
use crate::partition::*;
use crate::predict::*;
use crate::stats::SearchStats;
use crate::tiling::TileState;
use crate::util::*;

use std::mem;

/// Outcome of the mode decision of one leaf.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModeDecision {
  pub cost: f64,
  /// Weighted distortion, deblocking change included.
  pub dist: f64,
  /// Rate in 1/(1 << OD_BITRES) bits.
  pub bits: u32,
  pub pred_mode: PredMode,
  pub skip: bool,
  /// QP the coding unit ends up with.
  pub qp: u8,
}

/// Candidate buffers and deblocking scratch reused by every leaf.
#[derive(Debug, Clone)]
pub struct RdoScratch<T: Pixel> {
  best: PredictionCandidate<T>,
  trial: PredictionCandidate<T>,
  dbk: DeblockWork<T>,
}

impl<T: Pixel> RdoScratch<T> {
  pub fn new() -> Self {
    RdoScratch {
      best: PredictionCandidate::new(),
      trial: PredictionCandidate::new(),
      dbk: DeblockWork::new(),
    }
  }
}

#[inline]
pub fn compute_rd_cost(lambda: f64, distortion: f64, bits: u32) -> f64 {
  let rate = bits as f64 / (1 << OD_BITRES) as f64;
  distortion + lambda * rate
}

/// Costs `cand` from the `entry` state. Leaves the estimator at the state
/// coding the candidate would produce and returns that state.
fn evaluate_candidate<T: Pixel, E: EntropyEstimator>(
  fi: &FrameInvariants, tools: &Analyzers<T>, ts: &mut TileState<'_, T>,
  dbk: &mut DeblockWork<T>, est: &mut E, node: &CodingNode, qp: u8,
  entry: &SearchCheckpoint<E::State>, cand: &PredictionCandidate<T>,
) -> (ModeDecision, SearchCheckpoint<E::State>) {
  let cons = node.tree_cons;
  let mut dqp = entry.restore(est);
  let mut bits = est.estimate_all(&cand.syntax);
  let mut delta_coded = false;

  if !cand.skip {
    for p in cons.planes() {
      bits += est.estimate_bits(Symbol::CodedBlockFlag {
        plane: p,
        coded: cand.nnz[p] > 0,
      });
    }
    let coded = cons.planes().any(|p| cand.nnz[p] > 0);
    if coded && fi.dqp.enabled && !dqp.cu_qp_delta_is_coded {
      let delta = qp as i32 - dqp.prev_qp as i32;
      bits += est.estimate_bits(Symbol::DeltaQp { delta });
      dqp.cu_qp_delta_is_coded = true;
      dqp.prev_qp = qp;
      delta_coded = true;
    }
    for p in cons.planes().filter(|&p| cand.nnz[p] > 0) {
      for &c in cand.coef[p].iter().filter(|&&c| c != 0) {
        let level = c.unsigned_abs();
        bits += est.estimate_bits(Symbol::CoeffLevel { plane: p, level });
      }
    }
  }

  // Without a delta of its own the unit takes the predicted QP.
  let cu_qp =
    if !fi.dqp.enabled || delta_coded { qp } else { dqp.prev_qp };
  dqp.curr_qp = cu_qp;

  let mut dist = 0.;
  for p in cons.planes() {
    let (xd, yd) = if p == 0 { (0, 0) } else { (fi.xdec, fi.ydec) };
    let (w, h) = cand.dims[p];
    let (org, stride) = ts.input.block(p, node.x >> xd, node.y >> yd);
    let ssd = get_ssd(org, stride, &cand.reco[p], w, w, h);
    dist += ssd as f64 * fi.qp_tables.dist_weight(p, cu_qp);
  }

  let cu = ProvisionalCu {
    flags: cand.scu_flags(cons),
    mv: cand.mv,
    refi: cand.refi,
    qp: cu_qp,
  };
  let delta = delta_distortion(
    fi.config.deblocking,
    &*tools.deblock,
    dbk,
    &mut ts.maps,
    &ts.rec,
    ts.input,
    node,
    &cand.reco,
    &cu,
    cons.planes(),
    fi.bit_depth,
  );
  for p in cons.planes() {
    dist += delta[p] as f64 * fi.qp_tables.dist_weight(p, cu_qp);
  }
  let dist = dist.max(0.);

  let decision = ModeDecision {
    cost: compute_rd_cost(fi.qp_tables.lambda(qp), dist, bits),
    dist,
    bits,
    pred_mode: cand.pred_mode,
    skip: cand.skip,
    qp: cu_qp,
  };
  (decision, SearchCheckpoint::take(est, dqp))
}

// RDO-based mode decision
#[profiling::function]
pub fn rdo_mode_decision<T: Pixel, E: EntropyEstimator>(
  fi: &FrameInvariants, tools: &Analyzers<T>, ts: &mut TileState<'_, T>,
  sc: &mut RdoScratch<T>, stats: &mut SearchStats, est: &mut E,
  node: &CodingNode, qp: u8, dqp: &mut DqpState, dst: &mut CuData<T>,
  serial: u32,
) -> Option<ModeDecision> {
  let cons = node.tree_cons;
  let speed = &fi.config.speed_settings;
  let entry = SearchCheckpoint::take(est, *dqp);
  let qps = fi.qp_tables.plane_qps(qp);
  let lambda = fi.qp_tables.lambda(qp);
  let ctx = context_flags(&ts.maps, node);
  let mut best: Option<(ModeDecision, SearchCheckpoint<E::State>)> = None;

  if cons.allows_inter() && !fi.slice_type.is_intra() {
    let found = {
      let req = AnalysisRequest {
        node: *node,
        qps,
        lambda,
        avail: availability(&ts.maps, node, NeighborKind::Inter),
        ctx,
        slice_type: fi.slice_type,
        bit_depth: fi.bit_depth,
        src: ts.input,
        refs: ts.refs,
        rec: &ts.rec,
        maps: &ts.maps,
      };
      tools.inter.analyze(&req, &mut sc.trial)
    };
    if found {
      let (md, exit) = evaluate_candidate(
        fi, tools, ts, &mut sc.dbk, est, node, qp, &entry, &sc.trial,
      );
      best = Some((md, exit));
      mem::swap(&mut sc.best, &mut sc.trial);
    }
  }

  let precheck = match (&best, speed.intra_satd_precheck) {
    (Some(_), Some(threshold)) => {
      sc.best.satd as u64 <= threshold as u64 * node.area() as u64
    }
    _ => false,
  };

  if precheck {
    stats.intra_prechecks_skipped += 1;
  } else {
    let found = {
      let constrained = fi.config.constrained_intra_pred;
      let kind = NeighborKind::Intra { constrained };
      let req = AnalysisRequest {
        node: *node,
        qps,
        lambda,
        avail: availability(&ts.maps, node, kind),
        ctx,
        slice_type: fi.slice_type,
        bit_depth: fi.bit_depth,
        src: ts.input,
        refs: ts.refs,
        rec: &ts.rec,
        maps: &ts.maps,
      };
      tools.intra.analyze(&req, &mut sc.trial)
    };
    if found {
      let (md, exit) = evaluate_candidate(
        fi, tools, ts, &mut sc.dbk, est, node, qp, &entry, &sc.trial,
      );
      if best.as_ref().map_or(true, |(b, _)| md.cost < b.cost) {
        best = Some((md, exit));
        mem::swap(&mut sc.best, &mut sc.trial);
      }
    }
  }

  let Some((decision, exit)) = best else {
    *dqp = entry.restore(est);
    return None;
  };

  assert!(decision.cost >= 0.);
  *dqp = exit.restore(est);
  dst.write_candidate(
    &sc.best,
    fi.qp_tables.plane_qps(decision.qp),
    node.depth,
    cons,
    serial,
  );
  Some(decision)
}
