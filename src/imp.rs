// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Engine implementations. At the moment only the software engine ships here.

#[cfg(feature = "backend_soft")]
pub mod soft;
