// Copyright (c) 2017-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Entropy-coder state as seen by the search.
//!
//! The search never writes a bitstream. It asks an [`EntropyEstimator`]
//! what a syntax element would cost, and the estimator adapts its models
//! exactly like the real coder would. Because every trial coding moves that
//! state forward, each alternative is evaluated from a checkpoint and the
//! winner's state is restored before the search moves on.

use std::fmt::Debug;

mod estimator;
pub mod neighbor;

pub use self::estimator::*;

/// Fractional bits of precision of every bit count.
pub const OD_BITRES: u8 = 3;

/// A syntax element to be costed, with its context and value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
  SplitFlag { ctx: usize, split: bool },
  SkipFlag { ctx: usize, skip: bool },
  /// Intra versus inter, coded for non-skip blocks of inter slices.
  PredMode { ctx: usize, intra: bool },
  IbcFlag { ctx: usize, ibc: bool },
  MmvdFlag { mmvd: bool },
  AffineFlag { ctx: usize, affine: bool },
  IntraDir { luma: bool, mode: u8 },
  MvpIdx { idx: u8 },
  /// One motion vector difference component.
  Mvd { value: i16 },
  CodedBlockFlag { plane: usize, coded: bool },
  /// Absolute level of a non-zero coefficient; the sign is bypass coded.
  CoeffLevel { plane: usize, level: u32 },
  DeltaQp { delta: i32 },
}

/// Rate model with the same checkpoint/rollback discipline as the entropy
/// coder it stands in for.
pub trait EntropyEstimator {
  /// Full adaptive state. Restoring a checkpoint must make subsequent
  /// estimates identical to the ones made right after it was taken.
  type State: Clone + PartialEq + Debug + Send;

  fn checkpoint(&self) -> Self::State;

  fn rollback(&mut self, state: &Self::State);

  /// Cost of coding `symbol` in 1/(1 << [`OD_BITRES`]) bits. Updates the
  /// adaptive state as coding it would.
  fn estimate_bits(&mut self, symbol: Symbol) -> u32;

  fn estimate_all(&mut self, symbols: &[Symbol]) -> u32 {
    symbols.iter().map(|&s| self.estimate_bits(s)).sum()
  }
}

/// Delta QP bookkeeping carried through the coding tree.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DqpState {
  /// QP the next coded delta is predicted from.
  pub prev_qp: u8,
  /// QP of the current group.
  pub curr_qp: u8,
  /// The current group already signalled its delta.
  pub cu_qp_delta_is_coded: bool,
  /// Which node kind opened the current group, see `select_qp_range`.
  pub cu_qp_delta_code: u8,
}

impl DqpState {
  pub const fn new(qp: u8) -> Self {
    DqpState {
      prev_qp: qp,
      curr_qp: qp,
      cu_qp_delta_is_coded: false,
      cu_qp_delta_code: 0,
    }
  }

  /// Starts a new QP group at `qp`.
  pub fn open_group(&mut self, qp: u8, code: u8) {
    self.curr_qp = qp;
    self.cu_qp_delta_is_coded = false;
    self.cu_qp_delta_code = code;
  }
}

/// Everything the search rolls back between alternatives.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchCheckpoint<S> {
  pub sbac: S,
  pub dqp: DqpState,
}

impl<S: Clone> SearchCheckpoint<S> {
  pub fn take<E: EntropyEstimator<State = S>>(est: &E, dqp: DqpState) -> Self {
    SearchCheckpoint { sbac: est.checkpoint(), dqp }
  }

  /// Rolls `est` back and returns the delta QP state to continue from.
  pub fn restore<E: EntropyEstimator<State = S>>(
    &self, est: &mut E,
  ) -> DqpState {
    est.rollback(&self.sbac);
    self.dqp
  }
}
