// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Key 模块
//!
//! 该模块负责从一次调用的参数序列中派生缓存键。
//!
//! ## 设计意图
//! - **确定性**：相同的参数序列（按各元素的散列等价）必然派生出相同的键。
//! - **顺序敏感**：多参数组合采用有序折叠，交换参数顺序通常会改变键值。
//! - **碰撞容忍**：派生出的是散列键而非唯一标识，不同参数可能映射到同一个键，
//!   缓存层通过条目校验（如修改时间比对）来容忍碰撞。
//!
//! 键的派生规则是一套固定约定：空参数列表得到 `0`，单个缺失参数得到哨兵值
//! `53`，多参数从种子 `17` 开始按 `31 * acc + h` 折叠。这些常量是行为兼容的
//! 一部分，不作为可调参数暴露。

use bytes::Bytes;

#[cfg(test)]
use mockall::automock;

/// 空参数列表对应的键值。
pub const EMPTY_ARGS_CODE: i32 = 0;

/// 缺失参数（显式空位）参与散列时使用的哨兵值。
pub const ABSENT_ARG_CODE: i32 = 53;

/// 多参数折叠的起始种子。
const FOLD_SEED: i32 = 17;

/// 多参数折叠的乘数。
const FOLD_MULTIPLIER: i32 = 31;

/// 参与键派生的单个调用参数。
///
/// 调用方以 `Option<KeyArg>` 的有序序列描述一次调用：`None` 表示该位置的
/// 参数显式缺失。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyArg {
    /// 整型参数，散列值即其本身。
    Int(i32),
    /// 字符串参数，按 UTF-8 字节折叠散列。
    Str(String),
    /// 二进制参数，按字节折叠散列。
    Bytes(Bytes),
}

impl KeyArg {
    /// 计算参数的 32 位散列值。
    ///
    /// 字节序列使用与多参数组合相同的乘数 31 从 0 开始折叠，
    /// 因此 `KeyArg::Str("a".to_string()).hash_code() == 97`。
    /// 所有运算均为回绕（wrapping）算术，不会溢出 panic。
    pub fn hash_code(&self) -> i32 {
        match self {
            KeyArg::Int(v) => *v,
            KeyArg::Str(s) => fold_bytes(s.as_bytes()),
            KeyArg::Bytes(b) => fold_bytes(b),
        }
    }
}

// 字节折叠：h = 31 * h + b
fn fold_bytes(bytes: &[u8]) -> i32 {
    bytes.iter().fold(0i32, |acc, b| {
        acc.wrapping_mul(FOLD_MULTIPLIER).wrapping_add(*b as i32)
    })
}

/// 从参数序列派生出的缓存键。
///
/// 单个存在的参数按原样成为键（`Arg` 变体）；其余情形（空列表、单个缺失
/// 参数、多参数组合）都归结为一个整型代码（`Code` 变体）。
/// 实现了 `Eq + Hash`，可直接作为缓存容器的键使用。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// 单参数调用：键就是参数本身。
    Arg(KeyArg),
    /// 0、53 或多参数折叠结果。
    Code(i32),
}

/// 键派生能力。
///
/// `target` 与 `method` 是调用方上下文标记（接收者标识与方法标识），保留在
/// 签名中供实现方选用；默认实现不参与计算。
#[cfg_attr(test, automock)]
pub trait KeyGenerator {
    /// 从一个参数序列派生键。对任何输入都产生有效键，无错误路径。
    fn generate(&self, target: &str, method: &str, args: &[Option<KeyArg>]) -> CacheKey;
}

/// 默认键派生实现。
///
/// - 零参数 → `Code(0)`
/// - 单个存在的参数 → `Arg(参数本身)`
/// - 单个缺失参数 → `Code(53)`
/// - 两个及以上 → 从 17 起按 `31 * acc + hash` 折叠，缺失位置计 53
pub struct DefaultKeyGenerator;

impl KeyGenerator for DefaultKeyGenerator {
    fn generate(&self, _target: &str, _method: &str, args: &[Option<KeyArg>]) -> CacheKey {
        match args {
            [] => CacheKey::Code(EMPTY_ARGS_CODE),
            [Some(arg)] => CacheKey::Arg(arg.clone()),
            [None] => CacheKey::Code(ABSENT_ARG_CODE),
            _ => {
                let mut acc = FOLD_SEED;
                for arg in args {
                    let h = match arg {
                        Some(a) => a.hash_code(),
                        None => ABSENT_ARG_CODE,
                    };
                    acc = acc.wrapping_mul(FOLD_MULTIPLIER).wrapping_add(h);
                }
                CacheKey::Code(acc)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// 空参数列表固定派生出0
    #[test]
    fn test_empty_args() {
        let generator = DefaultKeyGenerator;
        assert_eq!(
            generator.generate("cache", "get", &[]),
            CacheKey::Code(EMPTY_ARGS_CODE)
        );
    }

    /// 单个存在的参数按原样成为键
    #[test]
    fn test_single_present_arg() {
        let generator = DefaultKeyGenerator;
        let key = generator.generate("cache", "get", &[Some(KeyArg::Str("index.html".to_string()))]);
        assert_eq!(key, CacheKey::Arg(KeyArg::Str("index.html".to_string())));

        let key = generator.generate("cache", "get", &[Some(KeyArg::Int(42))]);
        assert_eq!(key, CacheKey::Arg(KeyArg::Int(42)));
    }

    /// 单个缺失参数派生出哨兵值53
    #[test]
    fn test_single_absent_arg() {
        let generator = DefaultKeyGenerator;
        assert_eq!(
            generator.generate("cache", "get", &[None]),
            CacheKey::Code(ABSENT_ARG_CODE)
        );
    }

    /// 多参数折叠：[1, 2] -> 31*(31*17+1)+2 = 16370
    #[test]
    fn test_two_int_args() {
        let generator = DefaultKeyGenerator;
        let key = generator.generate(
            "cache",
            "get",
            &[Some(KeyArg::Int(1)), Some(KeyArg::Int(2))],
        );
        assert_eq!(key, CacheKey::Code(16370));
    }

    /// 缺失位置计53：[None, "a"] -> 31*(31*17+53)+97 = 18077
    #[test]
    fn test_absent_then_str() {
        let generator = DefaultKeyGenerator;
        let key = generator.generate(
            "cache",
            "get",
            &[None, Some(KeyArg::Str("a".to_string()))],
        );
        assert_eq!(key, CacheKey::Code(18077));
    }

    /// 全缺失的多参数列表同样是有效输入
    #[test]
    fn test_all_absent_args() {
        let generator = DefaultKeyGenerator;
        // 31*(31*17+53)+53 = 18033
        assert_eq!(
            generator.generate("cache", "get", &[None, None]),
            CacheKey::Code(18033)
        );
    }

    /// 参数顺序参与折叠，交换顺序改变键值
    #[test]
    fn test_order_sensitive() {
        let generator = DefaultKeyGenerator;
        let forward = generator.generate(
            "cache",
            "get",
            &[Some(KeyArg::Int(1)), Some(KeyArg::Int(2))],
        );
        let reversed = generator.generate(
            "cache",
            "get",
            &[Some(KeyArg::Int(2)), Some(KeyArg::Int(1))],
        );
        assert_ne!(forward, reversed);
    }

    /// 上下文标记不参与计算
    #[test]
    fn test_context_tokens_unused() {
        let generator = DefaultKeyGenerator;
        let args = [Some(KeyArg::Int(7)), Some(KeyArg::Str("x".to_string()))];
        assert_eq!(
            generator.generate("cache", "get", &args),
            generator.generate("other", "head", &args)
        );
    }

    /// 折叠使用回绕算术，大量大值参数不会panic
    #[test]
    fn test_fold_wraps_without_panic() {
        let generator = DefaultKeyGenerator;
        let args: Vec<Option<KeyArg>> = (0..64).map(|_| Some(KeyArg::Int(i32::MAX))).collect();
        let key = generator.generate("cache", "get", &args);
        assert!(matches!(key, CacheKey::Code(_)));
    }

    /// 字符串与二进制散列遵循同一套字节折叠
    #[test]
    fn test_hash_code() {
        assert_eq!(KeyArg::Int(99).hash_code(), 99);
        assert_eq!(KeyArg::Str("a".to_string()).hash_code(), 97);
        assert_eq!(KeyArg::Str(String::new()).hash_code(), 0);
        assert_eq!(KeyArg::Str("ab".to_string()).hash_code(), 31 * 97 + 98);
        assert_eq!(
            KeyArg::Bytes(Bytes::from_static(b"ab")).hash_code(),
            KeyArg::Str("ab".to_string()).hash_code()
        );
    }

    proptest! {
        /// 同一参数序列派生两次，键必然相同
        #[test]
        fn prop_generate_is_deterministic(
            values in prop::collection::vec(prop::option::of(any::<i32>()), 0..8)
        ) {
            let args: Vec<Option<KeyArg>> =
                values.iter().map(|v| v.map(KeyArg::Int)).collect();
            let generator = DefaultKeyGenerator;
            prop_assert_eq!(
                generator.generate("cache", "get", &args),
                generator.generate("cache", "get", &args)
            );
        }

        /// 单个存在的参数总是按原样返回
        #[test]
        fn prop_single_arg_identity(v in any::<i32>()) {
            let generator = DefaultKeyGenerator;
            prop_assert_eq!(
                generator.generate("cache", "get", &[Some(KeyArg::Int(v))]),
                CacheKey::Arg(KeyArg::Int(v))
            );
        }
    }
}
