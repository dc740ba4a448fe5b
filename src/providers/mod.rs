// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Third-party payment providers.

pub mod moonpay;

pub use moonpay::{OnrampRequest, RequestSigner, SignError, SignedUrl};
