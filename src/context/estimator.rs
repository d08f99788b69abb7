// Copyright (c) 2017-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

const PROB_BITS: u32 = 15;
const PROB_ONE: u32 = 1 << PROB_BITS;
const PROB_MIN: u32 = 1 << 5;
const MAX_COUNT: u8 = 31;
/// Cost of one equiprobable bin.
const BYPASS_COST: u32 = 1 << OD_BITRES;

const SPLIT_CTX: usize = 3;
const SKIP_CTX: usize = 3;
const PRED_MODE_CTX: usize = 3;
const IBC_CTX: usize = 3;
const AFFINE_CTX: usize = 3;

/// Fractional cost of a bin of probability `p / PROB_ONE`.
#[inline]
fn prob_cost(p: u32) -> u32 {
  let bits = -(p as f64 / PROB_ONE as f64).log2();
  (bits * BYPASS_COST as f64).round() as u32
}

/// Order-0 Exp-Golomb length of `v`, all bins bypass coded.
#[inline]
fn exp_golomb_bins(v: u32) -> u32 {
  let msb = 31 - (v + 1).leading_zeros();
  2 * msb + 1
}

/// Adaptive binary probability model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BinModel {
  /// Probability of a one, in 1/(1 << 15).
  p1: u16,
  count: u8,
}

impl BinModel {
  const fn new(p1: u16) -> Self {
    BinModel { p1, count: 0 }
  }

  const fn equiprobable() -> Self {
    Self::new((PROB_ONE / 2) as u16)
  }

  /// Costs `bin` and adapts towards it, faster while the model is young.
  fn code(&mut self, bin: bool) -> u32 {
    let p1 = self.p1 as u32;
    let cost = prob_cost(if bin { p1 } else { PROB_ONE - p1 });

    let rate = 4 + (self.count > 1) as u32 + (self.count > 7) as u32;
    let p1 =
      if bin { p1 + ((PROB_ONE - p1) >> rate) } else { p1 - (p1 >> rate) };
    self.p1 = p1.clamp(PROB_MIN, PROB_ONE - PROB_MIN) as u16;
    self.count = (self.count + 1).min(MAX_COUNT);

    cost
  }
}

/// Every context model the search consults.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContextModels {
  split: [BinModel; SPLIT_CTX],
  skip: [BinModel; SKIP_CTX],
  pred_mode: [BinModel; PRED_MODE_CTX],
  ibc: [BinModel; IBC_CTX],
  affine: [BinModel; AFFINE_CTX],
  mmvd: BinModel,
  intra_mpm: [BinModel; 2],
  mvd: [BinModel; 2],
  cbf: [BinModel; 3],
  coeff: [[BinModel; 2]; 2],
  delta_qp: [BinModel; 2],
}

impl Default for ContextModels {
  fn default() -> Self {
    let half = BinModel::equiprobable();
    ContextModels {
      split: [half; SPLIT_CTX],
      skip: [half; SKIP_CTX],
      pred_mode: [half; PRED_MODE_CTX],
      ibc: [BinModel::new(4096); IBC_CTX],
      affine: [BinModel::new(4096); AFFINE_CTX],
      mmvd: BinModel::new(8192),
      intra_mpm: [half; 2],
      mvd: [half; 2],
      cbf: [half; 3],
      coeff: [[half; 2]; 2],
      delta_qp: [half; 2],
    }
  }
}

/// Reference estimator: adaptive binary models with bypass-coded suffixes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdaptiveBitEstimator {
  models: ContextModels,
}

impl AdaptiveBitEstimator {
  pub fn new() -> Self {
    Self::default()
  }
}

impl EntropyEstimator for AdaptiveBitEstimator {
  type State = ContextModels;

  fn checkpoint(&self) -> ContextModels {
    self.models
  }

  fn rollback(&mut self, state: &ContextModels) {
    self.models = *state;
  }

  fn estimate_bits(&mut self, symbol: Symbol) -> u32 {
    let m = &mut self.models;
    match symbol {
      Symbol::SplitFlag { ctx, split } => {
        m.split[ctx.min(SPLIT_CTX - 1)].code(split)
      }
      Symbol::SkipFlag { ctx, skip } => {
        m.skip[ctx.min(SKIP_CTX - 1)].code(skip)
      }
      Symbol::PredMode { ctx, intra } => {
        m.pred_mode[ctx.min(PRED_MODE_CTX - 1)].code(intra)
      }
      Symbol::IbcFlag { ctx, ibc } => m.ibc[ctx.min(IBC_CTX - 1)].code(ibc),
      Symbol::AffineFlag { ctx, affine } => {
        m.affine[ctx.min(AFFINE_CTX - 1)].code(affine)
      }
      Symbol::MmvdFlag { mmvd } => m.mmvd.code(mmvd),
      Symbol::IntraDir { luma, mode } => {
        if luma {
          // Modes 0 and 1 are the most probable ones.
          let mpm = mode < 2;
          let suffix = if mpm { 1 } else { 5 };
          m.intra_mpm[0].code(mpm) + suffix * BYPASS_COST
        } else {
          let derived = mode == 0;
          let suffix = if derived { 0 } else { 2 };
          m.intra_mpm[1].code(derived) + suffix * BYPASS_COST
        }
      }
      Symbol::MvpIdx { idx } => (idx as u32 + 1).min(3) * BYPASS_COST,
      Symbol::Mvd { value } => {
        let abs = value.unsigned_abs() as u32;
        let mut cost = m.mvd[0].code(abs > 0);
        if abs > 0 {
          cost += m.mvd[1].code(abs > 1) + BYPASS_COST;
          if abs > 1 {
            cost += exp_golomb_bins(abs - 2) * BYPASS_COST;
          }
        }
        cost
      }
      Symbol::CodedBlockFlag { plane, coded } => {
        m.cbf[plane.min(2)].code(coded)
      }
      Symbol::CoeffLevel { plane, level } => {
        debug_assert!(level > 0);
        let ctx = &mut m.coeff[(plane > 0) as usize];
        let mut cost = ctx[0].code(level > 1) + BYPASS_COST;
        if level > 1 {
          cost += ctx[1].code(level > 2);
          if level > 2 {
            cost += exp_golomb_bins(level - 3) * BYPASS_COST;
          }
        }
        cost
      }
      Symbol::DeltaQp { delta } => {
        let abs = delta.unsigned_abs();
        let mut cost = m.delta_qp[0].code(abs > 0);
        if abs > 0 {
          for i in 1..=abs {
            cost += m.delta_qp[1].code(i < abs);
          }
          cost += BYPASS_COST;
        }
        cost
      }
    }
  }
}
