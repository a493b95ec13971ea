use super::LanguageGrammar;

pub struct RustGrammar;

impl LanguageGrammar for RustGrammar {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["rs"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn symbols_query(&self) -> &str {
        r#"
        (function_item
            name: (identifier) @name
        ) @function

        (struct_item
            name: (type_identifier) @name
        ) @struct

        (enum_item
            name: (type_identifier) @name
        ) @enum

        (trait_item
            name: (type_identifier) @name
        ) @trait

        (type_item
            name: (type_identifier) @name
        ) @type_alias
        "#
    }

    fn imports_query(&self) -> &str {
        r#"
        (use_declaration
            argument: (_) @source
        ) @import
        "#
    }

    fn calls_query(&self) -> &str {
        r#"
        (call_expression
            function: (identifier) @callee
        ) @call

        (call_expression
            function: (scoped_identifier
                name: (identifier) @callee
            )
        ) @scoped_call

        (impl_item
            trait: (type_identifier) @implements
            type: (type_identifier)
        )
        "#
    }
}
