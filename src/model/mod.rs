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

//! Type model and value types for FHIRPath evaluation
//!
//! This module holds the data-driven type registry, the runtime value
//! model and the reflective record contract the evaluator reads through.

pub mod error;
pub mod object;
pub mod quantity;
pub mod temporal;
pub mod type_registry;
pub mod types;
pub mod value;

pub use error::{RegistryError, TypeResolutionError};
pub use object::{DynamicObject, FhirObject, JsonObject};
pub use quantity::Quantity;
pub use temporal::{CalendarUnit, PrecisionDate, PrecisionDateTime, PrecisionTime, TemporalPrecision};
pub use type_registry::{BaseChain, TypeRegistry};
pub use types::{ClassInfo, SYSTEM_NAMESPACE, SimpleTypeInfo, TypeInfo, TypeSpecifier};
pub use value::{Collection, FhirPathValue, TypedValue};
