//! Domain identifiers (strongly-typed names).
//!
//! # Phantom Type パターン
//! task_id も owner_id も外部から与えられる任意の文字列ですが、
//! 取り違えるとロックの意味が壊れます（release(owner, task) の引数順ミスなど）。
//! `Name<T>` というジェネリック型で共通実装を提供しつつ、
//! `T` は実行時には使わない（PhantomData）マーカー型として、
//! コンパイル時に TaskKey と OwnerId を区別します。
//!
//! 形式の検証はしません。空文字列だけを拒否します。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;

/// NameMarker は各 Name 型のマーカー trait
pub trait NameMarker: Send + Sync + 'static {
    /// エラーメッセージで使うフィールド名（例: "task_id"）
    fn field() -> &'static str;
}

/// NameError は Name の構築エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// ジェネリック Name 型
///
/// # 例
/// ```ignore
/// let task = TaskKey::new("build-1")?;
/// let owner = OwnerId::new("agent-A")?;
/// // task と owner は異なる型なので、混同できない
/// ```
pub struct Name<T: NameMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: NameMarker> Name<T> {
    /// 文字列から Name を作成（空文字列は拒否）
    pub fn new(value: impl Into<String>) -> Result<Self, NameError> {
        let value = value.into();
        if value.is_empty() {
            return Err(NameError::Empty(T::field()));
        }
        Ok(Self {
            value,
            _marker: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

// derive だと T にも Clone/Eq などの境界が付いてしまうので手書きする
impl<T: NameMarker> Clone for Name<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: NameMarker> PartialEq for Name<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: NameMarker> Eq for Name<T> {}

impl<T: NameMarker> std::hash::Hash for Name<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: NameMarker> PartialOrd for Name<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: NameMarker> Ord for Name<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: NameMarker> Borrow<str> for Name<T> {
    fn borrow(&self) -> &str {
        &self.value
    }
}

impl<T: NameMarker> fmt::Debug for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", T::field(), self.value)
    }
}

impl<T: NameMarker> fmt::Display for Name<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: NameMarker> std::str::FromStr for Name<T> {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<T: NameMarker> Serialize for Name<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T: NameMarker> Deserialize<'de> for Name<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl NameMarker for Task {
    fn field() -> &'static str {
        "task_id"
    }
}

/// Owner のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {}

impl NameMarker for Owner {
    fn field() -> &'static str {
        "owner_id"
    }
}

/// Identifier of a unit of work, chosen by whoever hands out the work.
pub type TaskKey = Name<Task>;

/// Identifier of a claiming worker, stable for its process or session.
pub type OwnerId = Name<Owner>;
