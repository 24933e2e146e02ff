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

//! Utility functions: trace, now, today, timeOfDay, aggregate

use super::{FunctionCategory, FunctionLibrary};
use crate::model::{
    Collection, FhirPathValue, PrecisionDate, PrecisionDateTime, PrecisionTime, TemporalPrecision,
};
use crate::register_function;

/// Log target of the `trace()` function
const TRACE_TARGET: &str = "fhirpath::trace";

impl FunctionLibrary {
    pub(crate) fn register_utility_functions(&mut self) {
        self.register_trace_function();
        self.register_clock_functions();
        self.register_aggregate_function();
    }

    fn register_trace_function(&mut self) {
        register_function!(
            self,
            "trace",
            category: FunctionCategory::Utility,
            description: "Logs the input, or a projection of it, under a label and returns the input unchanged",
            parameters: ["name": "String" => "Label written with the values"],
            optional: ["projection": "expression" => "Expression evaluated per item before logging"],
            return_type: "collection",
            examples: ["Patient.name.trace('names').given", "Patient.name.trace('given', given)"],
            implementation: |call| {
                let label = call.string_argument(0)?.unwrap_or_default();
                if call.arg_count() > 1 {
                    let mut projected = Collection::new();
                    for (index, item) in call.input().iter().enumerate() {
                        projected.extend(call.evaluate_for(1, item, index)?);
                    }
                    log::debug!(target: TRACE_TARGET, "{label}: {projected}");
                } else {
                    log::debug!(target: TRACE_TARGET, "{label}: {}", call.input());
                }
                Ok(call.take_input())
            }
        );
    }

    fn register_clock_functions(&mut self) {
        register_function!(
            self,
            "now",
            category: FunctionCategory::Utility,
            description: "Returns the current date and time, stable within one evaluation",
            parameters: [],
            return_type: "DateTime",
            examples: ["now()"],
            implementation: |call| {
                let now = PrecisionDateTime::from_datetime(call.now());
                Ok(Collection::single(FhirPathValue::DateTime(now)))
            }
        );
        register_function!(
            self,
            "today",
            category: FunctionCategory::Utility,
            description: "Returns the current date, stable within one evaluation",
            parameters: [],
            return_type: "Date",
            examples: ["today()"],
            implementation: |call| {
                let today = PrecisionDate::from_date(call.now().date_naive());
                Ok(Collection::single(FhirPathValue::Date(today)))
            }
        );
        register_function!(
            self,
            "timeOfDay",
            category: FunctionCategory::Utility,
            description: "Returns the current time of day, stable within one evaluation",
            parameters: [],
            return_type: "Time",
            examples: ["timeOfDay()"],
            implementation: |call| {
                let time = PrecisionTime::new(call.now().time(), TemporalPrecision::Millisecond);
                Ok(Collection::single(FhirPathValue::Time(time)))
            }
        );
    }

    fn register_aggregate_function(&mut self) {
        register_function!(
            self,
            "aggregate",
            category: FunctionCategory::Utility,
            description: "Folds the input with the aggregator, binding the running result to $total",
            parameters: ["aggregator": "expression" => "Expression combining $this and $total"],
            optional: ["init": "collection" => "Initial value of $total, empty by default"],
            return_type: "collection",
            examples: ["(1 | 2 | 3).aggregate($this + $total, 0)"],
            implementation: |call| {
                let mut total = call.argument(1)?;
                for (index, item) in call.input().iter().enumerate() {
                    call.check_cancelled()?;
                    total = call.evaluate_with_total(0, item, index, total)?;
                }
                Ok(total)
            }
        );
    }
}
