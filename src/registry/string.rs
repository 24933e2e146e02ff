// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! String functions implementation for FHIRPath
//!
//! Positions and lengths count characters, not bytes. Every function except
//! `join` takes a single string input and yields empty for an empty input.

use super::{FunctionCall, FunctionCategory, FunctionLibrary};
use crate::evaluator::EvaluationResult;
use crate::model::{Collection, FhirPathValue};
use crate::register_function;
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on cached patterns before the cache is flushed
const REGEX_CACHE_LIMIT: usize = 256;

static REGEX_CACHE: Lazy<DashMap<String, Regex>> = Lazy::new(DashMap::new);

/// Compile `pattern` once per process; `.` matches newlines as well
fn cached_regex(call: &FunctionCall<'_>, pattern: &str) -> EvaluationResult<Regex> {
    if let Some(regex) = REGEX_CACHE.get(pattern) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&format!("(?s){pattern}"))
        .map_err(|e| call.invalid_argument(format!("invalid regular expression: {e}")))?;
    if REGEX_CACHE.len() >= REGEX_CACHE_LIMIT {
        REGEX_CACHE.clear();
    }
    REGEX_CACHE.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// The single string input, `None` when the input is empty
fn input_string(call: &FunctionCall<'_>) -> EvaluationResult<Option<String>> {
    match call.singleton_input()? {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| call.type_mismatch(value)),
    }
}

fn string(value: impl Into<String>) -> Collection {
    Collection::single(FhirPathValue::String(value.into()))
}

fn boolean(value: bool) -> Collection {
    Collection::single(FhirPathValue::Boolean(value))
}

fn integer(value: usize) -> Collection {
    i64::try_from(value)
        .map(|i| Collection::single(FhirPathValue::Integer(i)))
        .unwrap_or_default()
}

/// Apply `f` to the input string and the first string argument; empty if either is missing
fn with_string_argument(
    call: &FunctionCall<'_>,
    f: impl FnOnce(&str, &str) -> Collection,
) -> EvaluationResult<Collection> {
    let Some(text) = input_string(call)? else {
        return Ok(Collection::empty());
    };
    let Some(argument) = call.string_argument(0)? else {
        return Ok(Collection::empty());
    };
    Ok(f(&text, &argument))
}

fn char_index_of(text: &str, needle: &str) -> Option<usize> {
    text.find(needle).map(|byte| text[..byte].chars().count())
}

fn substring(text: &str, start: i64, length: Option<i64>) -> Option<String> {
    let start = usize::try_from(start).ok()?;
    let char_count = text.chars().count();
    if start >= char_count {
        return None;
    }
    let chars = text.chars().skip(start);
    Some(match length {
        Some(length) => chars.take(usize::try_from(length).unwrap_or(0)).collect(),
        None => chars.collect(),
    })
}

impl FunctionLibrary {
    pub(crate) fn register_string_functions(&mut self) {
        self.register_search_functions();
        self.register_substring_function();
        self.register_case_functions();
        self.register_replace_functions();
        self.register_length_functions();
        self.register_split_join_functions();
        self.register_trim_function();
        self.register_encoding_functions();
    }

    fn register_search_functions(&mut self) {
        register_function!(
            self,
            "indexOf",
            category: FunctionCategory::String,
            description: "Returns the 0-based position of the substring, or -1 if it is absent",
            parameters: ["substring": "String" => "Substring to search for"],
            return_type: "Integer",
            examples: ["'abcdefg'.indexOf('bc')"],
            implementation: |call| {
                with_string_argument(call, |text, needle| match char_index_of(text, needle) {
                    Some(index) => integer(index),
                    None => Collection::single(FhirPathValue::Integer(-1)),
                })
            }
        );
        register_function!(
            self,
            "startsWith",
            category: FunctionCategory::String,
            description: "Returns true if the input starts with the prefix",
            parameters: ["prefix": "String" => "Prefix to test"],
            return_type: "Boolean",
            examples: ["'abcdefg'.startsWith('abc')"],
            implementation: |call| with_string_argument(call, |text, prefix| boolean(text.starts_with(prefix)))
        );
        register_function!(
            self,
            "endsWith",
            category: FunctionCategory::String,
            description: "Returns true if the input ends with the suffix",
            parameters: ["suffix": "String" => "Suffix to test"],
            return_type: "Boolean",
            examples: ["'abcdefg'.endsWith('efg')"],
            implementation: |call| with_string_argument(call, |text, suffix| boolean(text.ends_with(suffix)))
        );
        register_function!(
            self,
            "contains",
            category: FunctionCategory::String,
            description: "Returns true if the input contains the substring",
            parameters: ["substring": "String" => "Substring to search for"],
            return_type: "Boolean",
            examples: ["'abc'.contains('b')"],
            implementation: |call| with_string_argument(call, |text, needle| boolean(text.contains(needle)))
        );
        register_function!(
            self,
            "matches",
            category: FunctionCategory::String,
            description: "Returns true if the regular expression matches anywhere in the input",
            parameters: ["regex": "String" => "Regular expression"],
            return_type: "Boolean",
            examples: ["'N8000123123'.matches('N[0-9]{8}')"],
            implementation: |call| {
                let Some(text) = input_string(call)? else {
                    return Ok(Collection::empty());
                };
                let Some(pattern) = call.string_argument(0)? else {
                    return Ok(Collection::empty());
                };
                Ok(boolean(cached_regex(call, &pattern)?.is_match(&text)))
            }
        );
    }

    fn register_substring_function(&mut self) {
        register_function!(
            self,
            "substring",
            category: FunctionCategory::String,
            description: "Returns the part of the input starting at start, optionally limited to length characters",
            parameters: ["start": "Integer" => "0-based start position"],
            optional: ["length": "Integer" => "Number of characters"],
            return_type: "String",
            examples: ["'abcdefg'.substring(3)", "'abcdefg'.substring(1, 2)"],
            implementation: |call| {
                let Some(text) = input_string(call)? else {
                    return Ok(Collection::empty());
                };
                let Some(start) = call.integer_argument(0)? else {
                    return Ok(Collection::empty());
                };
                let length = call.integer_argument(1)?;
                Ok(substring(&text, start, length).map(string).unwrap_or_default())
            }
        );
    }

    fn register_case_functions(&mut self) {
        register_function!(
            self,
            "upper",
            category: FunctionCategory::String,
            description: "Returns the input in upper case",
            parameters: [],
            return_type: "String",
            examples: ["'abc'.upper()"],
            implementation: |call| Ok(input_string(call)?.map(|s| string(s.to_uppercase())).unwrap_or_default())
        );
        register_function!(
            self,
            "lower",
            category: FunctionCategory::String,
            description: "Returns the input in lower case",
            parameters: [],
            return_type: "String",
            examples: ["'ABC'.lower()"],
            implementation: |call| Ok(input_string(call)?.map(|s| string(s.to_lowercase())).unwrap_or_default())
        );
    }

    fn register_replace_functions(&mut self) {
        register_function!(
            self,
            "replace",
            category: FunctionCategory::String,
            description: "Replaces every occurrence of pattern with substitution",
            parameters: [
                "pattern": "String" => "Literal text to replace",
                "substitution": "String" => "Replacement text"
            ],
            return_type: "String",
            examples: ["'abcdefg'.replace('cde', '123')"],
            implementation: |call| {
                let Some(text) = input_string(call)? else {
                    return Ok(Collection::empty());
                };
                let (Some(pattern), Some(substitution)) =
                    (call.string_argument(0)?, call.string_argument(1)?)
                else {
                    return Ok(Collection::empty());
                };
                Ok(string(text.replace(&pattern, &substitution)))
            }
        );
        register_function!(
            self,
            "replaceMatches",
            category: FunctionCategory::String,
            description: "Replaces every match of the regular expression; $1 style group references are expanded",
            parameters: [
                "regex": "String" => "Regular expression",
                "substitution": "String" => "Replacement text"
            ],
            return_type: "String",
            examples: ["'11/30/1972'.replaceMatches('\\\\b(?<month>\\\\d{1,2})/(?<day>\\\\d{1,2})/(?<year>\\\\d{2,4})\\\\b', '${day}-${month}-${year}')"],
            implementation: |call| {
                let Some(text) = input_string(call)? else {
                    return Ok(Collection::empty());
                };
                let (Some(pattern), Some(substitution)) =
                    (call.string_argument(0)?, call.string_argument(1)?)
                else {
                    return Ok(Collection::empty());
                };
                let regex = cached_regex(call, &pattern)?;
                Ok(string(regex.replace_all(&text, substitution.as_str())))
            }
        );
    }

    fn register_length_functions(&mut self) {
        register_function!(
            self,
            "length",
            category: FunctionCategory::String,
            description: "Returns the number of characters in the input",
            parameters: [],
            return_type: "Integer",
            examples: ["'abc'.length()"],
            implementation: |call| Ok(input_string(call)?.map(|s| integer(s.chars().count())).unwrap_or_default())
        );
        register_function!(
            self,
            "toChars",
            category: FunctionCategory::String,
            description: "Returns the characters of the input as a collection of strings",
            parameters: [],
            return_type: "collection",
            examples: ["'abc'.toChars()"],
            implementation: |call| {
                Ok(input_string(call)?
                    .map(|s| s.chars().map(|c| FhirPathValue::String(c.to_string())).collect())
                    .unwrap_or_default())
            }
        );
    }

    fn register_split_join_functions(&mut self) {
        register_function!(
            self,
            "split",
            category: FunctionCategory::String,
            description: "Splits the input at every occurrence of the separator",
            parameters: ["separator": "String" => "Separator text"],
            return_type: "collection",
            examples: ["'A,B,C'.split(',')"],
            implementation: |call| {
                with_string_argument(call, |text, separator| {
                    if separator.is_empty() {
                        return text.chars().map(|c| FhirPathValue::String(c.to_string())).collect();
                    }
                    text.split(separator).map(FhirPathValue::string).collect()
                })
            }
        );
        register_function!(
            self,
            "join",
            category: FunctionCategory::String,
            description: "Joins the input strings with the separator, or with nothing",
            parameters: [],
            optional: ["separator": "String" => "Separator text"],
            return_type: "String",
            examples: ["('A' | 'B' | 'C').join(',')"],
            implementation: |call| {
                let separator = call.string_argument(0)?.unwrap_or_default();
                let parts = call
                    .input()
                    .iter()
                    .map(|item| item.as_str().ok_or_else(|| call.type_mismatch(item)))
                    .collect::<EvaluationResult<Vec<_>>>()?;
                Ok(string(parts.join(&separator)))
            }
        );
    }

    fn register_trim_function(&mut self) {
        register_function!(
            self,
            "trim",
            category: FunctionCategory::String,
            description: "Removes leading and trailing whitespace",
            parameters: [],
            return_type: "String",
            examples: ["'  abc  '.trim()"],
            implementation: |call| Ok(input_string(call)?.map(|s| string(s.trim())).unwrap_or_default())
        );
    }

    fn register_encoding_functions(&mut self) {
        register_function!(
            self,
            "encode",
            category: FunctionCategory::String,
            description: "Encodes the input as base64, urlbase64 or hex",
            parameters: ["format": "String" => "base64, urlbase64 or hex"],
            return_type: "String",
            examples: ["'test'.encode('base64')"],
            implementation: |call| {
                let Some(text) = input_string(call)? else {
                    return Ok(Collection::empty());
                };
                let Some(format) = call.string_argument(0)? else {
                    return Ok(Collection::empty());
                };
                let encoded = match format.as_str() {
                    "base64" => STANDARD.encode(text.as_bytes()),
                    "urlbase64" => URL_SAFE.encode(text.as_bytes()),
                    "hex" => hex::encode(text.as_bytes()),
                    other => return Err(call.invalid_argument(format!("unknown format '{other}'"))),
                };
                Ok(string(encoded))
            }
        );
        register_function!(
            self,
            "decode",
            category: FunctionCategory::String,
            description: "Decodes base64, urlbase64 or hex input into a string",
            parameters: ["format": "String" => "base64, urlbase64 or hex"],
            return_type: "String",
            examples: ["'dGVzdA=='.decode('base64')"],
            implementation: |call| {
                let Some(text) = input_string(call)? else {
                    return Ok(Collection::empty());
                };
                let Some(format) = call.string_argument(0)? else {
                    return Ok(Collection::empty());
                };
                let bytes = match format.as_str() {
                    "base64" => STANDARD.decode(text.as_bytes()).map_err(|e| e.to_string()),
                    "urlbase64" => URL_SAFE.decode(text.as_bytes()).map_err(|e| e.to_string()),
                    "hex" => hex::decode(text.as_bytes()).map_err(|e| e.to_string()),
                    other => return Err(call.invalid_argument(format!("unknown format '{other}'"))),
                }
                .map_err(|e| call.error(format!("malformed {format} input: {e}")))?;
                let decoded = String::from_utf8(bytes)
                    .map_err(|_| call.error("decoded bytes are not valid UTF-8"))?;
                Ok(string(decoded))
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("abcdefg", 3, None, Some("defg"))]
    #[case("abcdefg", 1, Some(2), Some("bc"))]
    #[case("abcdefg", 7, None, None)]
    #[case("abcdefg", -1, None, None)]
    #[case("abcdefg", 2, Some(-1), Some(""))]
    #[case("héllo", 1, Some(3), Some("éll"))]
    fn test_substring(
        #[case] text: &str,
        #[case] start: i64,
        #[case] length: Option<i64>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(substring(text, start, length).as_deref(), expected);
    }

    #[test]
    fn test_char_index_counts_characters() {
        assert_eq!(char_index_of("héllo", "l"), Some(2));
        assert_eq!(char_index_of("abc", "z"), None);
        assert_eq!(char_index_of("abc", ""), Some(0));
    }
}
