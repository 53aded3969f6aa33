// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Magyar Üzemanyagárak.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use serde::Serialize;
use serde_json::{Map, Value};

/// Body of `POST /api/states/<entity_id>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateUpdate {
    pub state: String,
    pub attributes: Map<String, Value>,
}
