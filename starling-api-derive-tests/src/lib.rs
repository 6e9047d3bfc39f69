//! Integration tests for `starling-api-derive` live under `tests/`.
