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

//! FHIRPath expression parser
//!
//! Turns expression text into an [`ExpressionNode`] tree. The parser needs no
//! type registry: names such as `Patient` stay identifiers and are resolved
//! against the model at evaluation time.

pub mod error;
pub mod pratt;
pub mod span;
pub mod tokenizer;

pub use error::{ParseError, ParseResult};
pub use pratt::{PrattParser, parse_expression_pratt};
pub use span::Spanned;
pub use tokenizer::{Token, Tokenizer};

use crate::ast::ExpressionNode;

/// Parse an FHIRPath expression string into an AST
pub fn parse(input: &str) -> ParseResult<ExpressionNode> {
    parse_expression_pratt(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Patient.name.given")]
    #[case("Patient.name.where(use = 'official').family")]
    #[case("(1 + 2) * 3")]
    #[case("5 - (3 - 1)")]
    #[case("-(1 + 2)")]
    #[case("(-5).abs()")]
    #[case("not (a or b)")]
    #[case("a implies b or c and d")]
    #[case("(a implies b) implies c")]
    #[case("value is FHIR.Quantity and (value as Quantity).value > 5 'mg'")]
    #[case("name.select(given | family).count()")]
    #[case("@2015-02-04T14:34:28+09:00 > @2015T")]
    #[case("@T14:30:15.250 = %`us-zip`")]
    #[case("'it\\'s' & '\\n'")]
    #[case("`div`.`given name` contains 'x'")]
    #[case("{}.empty() xor $this.exists($index > 0)")]
    #[case("today() + 3 days")]
    #[case("Patient.name[0].given[1]")]
    fn test_display_round_trip(#[case] text: &str) {
        let ast = parse(text).unwrap();
        let printed = ast.to_string();
        let reparsed = parse(&printed).unwrap();
        assert_eq!(ast, reparsed, "printed as {printed}");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "Patient.name.where(given.exists()).family.first()";
        assert_eq!(parse(text).unwrap(), parse(text).unwrap());
    }

    #[test]
    fn test_parse_error_carries_position() {
        let error = parse("Patient.name.where(").unwrap_err();
        assert_eq!(error.position(), "Patient.name.where(".len());
        assert!(!error.message().is_empty());
    }
}
