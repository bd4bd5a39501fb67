//! Fixtures shared by the test modules.

/// WASI guest that opens argv[1] under the first preopen (`/output`) and
/// writes four fixed bytes to it.
pub(crate) const DEADBEEF_WAT: &str = r#"
(module
  (import "wasi_snapshot_preview1" "args_sizes_get"
    (func $args_sizes_get (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "args_get"
    (func $args_get (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "path_open"
    (func $path_open (param i32 i32 i32 i32 i32 i64 i64 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_close"
    (func $fd_close (param i32) (result i32)))
  (memory (export "memory") 1)
  (data (i32.const 512) "\de\ad\be\ef")
  (func $check (param i32)
    (if (local.get 0) (then unreachable)))
  (func (export "_start")
    (local $argv1 i32)
    (local $len i32)
    (call $check (call $args_sizes_get (i32.const 0) (i32.const 4)))
    (call $check (call $args_get (i32.const 16) (i32.const 64)))
    (local.set $argv1 (i32.load (i32.const 20)))
    (local.set $len
      (i32.sub
        (i32.sub (i32.load (i32.const 4)) (i32.sub (local.get $argv1) (i32.const 64)))
        (i32.const 1)))
    ;; skip the "/output/" prefix
    (call $check
      (call $path_open
        (i32.const 3) (i32.const 0)
        (i32.add (local.get $argv1) (i32.const 8))
        (i32.sub (local.get $len) (i32.const 8))
        (i32.const 1) (i64.const 64) (i64.const 0) (i32.const 0) (i32.const 8)))
    (i32.store (i32.const 480) (i32.const 512))
    (i32.store (i32.const 484) (i32.const 4))
    (call $check
      (call $fd_write (i32.load (i32.const 8)) (i32.const 480) (i32.const 1) (i32.const 496)))
    (call $check (call $fd_close (i32.load (i32.const 8))))))
"#;
