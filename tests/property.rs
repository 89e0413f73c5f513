// Copyright (c) 2025 - Cowboy AI, Inc.
mod property {
    pub mod book_invariants;
    pub mod money_rounding;
}
