use colored::*;
use protodeck_core::{
    descriptor::{DescriptorSet, FieldInfo, MethodInfo},
    prost_reflect::{EnumDescriptor, Kind, MessageDescriptor, MethodDescriptor, ServiceDescriptor},
    schema::Descriptor,
    workbench::ApiError,
};

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<ApiError> for FormattedString {
    fn from(err: ApiError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            format!("{}:", err.kind).red().bold(),
            err.message
        ))
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        FormattedString(format!("{}\n\n'{:#}'", "Error:".red().bold(), err))
    }
}

impl From<DescriptorSet> for FormattedString {
    fn from(set: DescriptorSet) -> Self {
        if set.services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        if !set.package_name.is_empty() {
            out.push_str(&format!("{} {}\n\n", "package".cyan(), set.package_name));
        }

        for service in &set.services {
            out.push_str(&format!(
                "{} {} {{\n",
                "service".cyan(),
                service.full_name.green()
            ));
            for method in set.methods.iter().filter(|m| m.service == service.full_name) {
                push_method(&mut out, method);
            }
            out.push_str("}\n\n");
        }

        FormattedString(out.trim_end().to_string())
    }
}

fn push_method(out: &mut String, method: &MethodInfo) {
    let stream = |on: bool| {
        if on {
            format!("{} ", "stream".cyan())
        } else {
            String::new()
        }
    };

    out.push_str(&format!(
        "  {} {}({}{}) {} ({}{});\n",
        "rpc".cyan(),
        method.name.green(),
        stream(method.request_stream),
        method.input_type.yellow(),
        "returns".cyan(),
        stream(method.response_stream),
        method.output_type.yellow()
    ));

    push_fields(out, &method.request_fields, 2);
}

fn push_fields(out: &mut String, fields: &[FieldInfo], depth: usize) {
    let indent = "  ".repeat(depth);

    for field in fields {
        let label = if field.repeated {
            format!("{} ", "repeated".cyan())
        } else {
            String::new()
        };

        let mut line = format!("{indent}{label}{} {}", field.type_name.yellow(), field.name);
        if let Some(oneof) = &field.oneof {
            line.push_str(&format!(" {}", format!("(oneof {oneof})").dimmed()));
        }
        if let Some(values) = &field.enum_values {
            line.push_str(&format!(" {}", format!("[{}]", values.join(" | ")).purple()));
        }
        out.push_str(&line);
        out.push('\n');

        if let Some(nested) = &field.nested_fields {
            push_fields(out, nested, depth + 1);
        }
    }
}

impl From<Descriptor> for FormattedString {
    fn from(descriptor: Descriptor) -> Self {
        match descriptor {
            Descriptor::MessageDescriptor(m) => m.into(),
            Descriptor::ServiceDescriptor(s) => s.into(),
            Descriptor::EnumDescriptor(e) => e.into(),
        }
    }
}

impl From<ServiceDescriptor> for FormattedString {
    fn from(service: ServiceDescriptor) -> Self {
        let mut out = format!("{} {} {{\n", "service".cyan(), service.name().green());

        for method in service.methods() {
            out.push_str("  ");
            out.push_str(&FormattedString::from(method).0);
            out.push('\n');
        }
        out.push('}');
        FormattedString(out)
    }
}

impl From<MethodDescriptor> for FormattedString {
    fn from(method: MethodDescriptor) -> Self {
        let input_stream = if method.is_client_streaming() {
            format!("{} ", "stream".cyan())
        } else {
            String::new()
        };
        let output_stream = if method.is_server_streaming() {
            format!("{} ", "stream".cyan())
        } else {
            String::new()
        };

        FormattedString(format!(
            "{} {}({}{}) {} ({}{});",
            "rpc".cyan(),
            method.name().green(),
            input_stream,
            method.input().full_name().yellow(),
            "returns".cyan(),
            output_stream,
            method.output().full_name().yellow()
        ))
    }
}

impl From<MessageDescriptor> for FormattedString {
    fn from(message: MessageDescriptor) -> Self {
        let mut out = format!("{} {} {{\n", "message".cyan(), message.name().green());

        for field in message.fields() {
            let type_name = match field.kind() {
                Kind::Message(m) if field.is_map() => {
                    let key = m.map_entry_key_field().kind();
                    let value = m.map_entry_value_field().kind();
                    format!("map<{}, {}>", kind_name(&key), kind_name(&value))
                }
                kind => kind_name(&kind),
            };

            let label = if field.is_list() {
                format!("{} ", "repeated".cyan())
            } else {
                String::new()
            };

            out.push_str(&format!(
                "  {}{} {} = {};\n",
                label,
                type_name.yellow(),
                field.name(),
                field.number()
            ));
        }
        out.push('}');
        FormattedString(out)
    }
}

fn kind_name(kind: &Kind) -> String {
    match kind {
        Kind::Double => "double".into(),
        Kind::Float => "float".into(),
        Kind::Int32 => "int32".into(),
        Kind::Int64 => "int64".into(),
        Kind::Uint32 => "uint32".into(),
        Kind::Uint64 => "uint64".into(),
        Kind::Sint32 => "sint32".into(),
        Kind::Sint64 => "sint64".into(),
        Kind::Fixed32 => "fixed32".into(),
        Kind::Fixed64 => "fixed64".into(),
        Kind::Sfixed32 => "sfixed32".into(),
        Kind::Sfixed64 => "sfixed64".into(),
        Kind::Bool => "bool".into(),
        Kind::String => "string".into(),
        Kind::Bytes => "bytes".into(),
        Kind::Message(m) => m.full_name().into(),
        Kind::Enum(e) => e.full_name().into(),
    }
}

impl From<EnumDescriptor> for FormattedString {
    fn from(enum_desc: EnumDescriptor) -> Self {
        let mut out = format!("{} {} {{\n", "enum".cyan(), enum_desc.name().green());

        for val in enum_desc.values() {
            out.push_str(&format!(
                "  {} = {};\n",
                val.name(),
                val.number().to_string().purple()
            ));
        }
        out.push('}');

        FormattedString(out)
    }
}
