/*
 pbprod
 Copyright 2024-2025 Peter Pearson.
 Licensed under the Apache License, Version 2.0 (the "License");
 You may not use this file except in compliance with the License.
 You may obtain a copy of the License at
 http://www.apache.org/licenses/LICENSE-2.0
 Unless required by applicable law or agreed to in writing, software
 distributed under the License is distributed on an "AS IS" BASIS,
 WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 See the License for the specific language governing permissions and
 limitations under the License.
 ---------
*/

use std::collections::BTreeMap;
use std::fmt;

use yaml_rust::Yaml;

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Unknown,
    Bool(bool),
    Int(i64),
    Str(String),
    Array(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>)
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            ParamValue::Unknown => write!(f, "Unknown"),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Str(s) => write!(f, "'{}'", s),
            ParamValue::Array(arr) => {
                write!(f, "[")?;
                for (index, it) in arr.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", it)?;
                }
                write!(f, "]")
            },
            ParamValue::Map(map) => {
                write!(f, "{{")?;
                for (key, val) in map {
                    write!(f, " {}: {},", key, val)?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl From<Yaml> for ParamValue {
    fn from(item: Yaml) -> Self {
        match item {
            Yaml::Boolean(v) => ParamValue::Bool(v),
            Yaml::Integer(v) => ParamValue::Int(v),
            Yaml::String(v) => ParamValue::Str(v),
            // YAML reads things like '1.5' as reals, keep the raw text
            Yaml::Real(v) => ParamValue::Str(v),
            Yaml::Array(v) => {
                ParamValue::Array(v.into_iter().map(ParamValue::from).collect())
            },
            Yaml::Hash(v) => {
                let mut new_map = BTreeMap::new();

                for (key, val) in v {
                    match key {
                        Yaml::String(key_string) => {
                            new_map.insert(key_string, ParamValue::from(val));
                        },
                        Yaml::Integer(key_int) => {
                            new_map.insert(key_int.to_string(), ParamValue::from(val));
                        },
                        _ => {
                            tracing::warn!("Ignoring non-string key in params map: {:?}", key);
                        }
                    }
                }

                ParamValue::Map(new_map)
            },
            _ => ParamValue::Unknown
        }
    }
}

impl ParamValue {
    /// Scalars as strings. YAML is really annoying with numbers, so ints are
    /// happily turned back into strings here.
    pub fn as_string(&self) -> Option<String> {
        match self {
            ParamValue::Str(str_val) => Some(str_val.clone()),
            ParamValue::Int(int_val) => Some(int_val.to_string()),
            ParamValue::Bool(bool_val) => Some(bool_val.to_string()),
            _ => None
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ParamValue::Int(int_val) => u32::try_from(*int_val).ok(),
            ParamValue::Str(str_val) => str_val.trim().parse::<u32>().ok(),
            _ => None
        }
    }

    /// Arrays are flattened to their scalar items, while a single string is
    /// split on commas, so both `[22, 80]` and `22,80` give the same list.
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            ParamValue::Array(vec) => {
                vec.iter().filter_map(|it| it.as_string()).collect()
            },
            ParamValue::Str(str_val) => {
                str_val.split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            },
            ParamValue::Int(int_val) => vec![int_val.to_string()],
            _ => Vec::new()
        }
    }
}
