use super::LanguageGrammar;

pub struct TypeScriptGrammar;

impl LanguageGrammar for TypeScriptGrammar {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &[&'static str] {
        &["ts", "tsx", "js", "jsx"]
    }

    fn language(&self) -> tree_sitter::Language {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }

    fn symbols_query(&self) -> &str {
        r#"
        (function_declaration
            name: (identifier) @name
        ) @function

        (class_declaration
            name: (type_identifier) @name
        ) @class

        (interface_declaration
            name: (type_identifier) @name
        ) @interface

        (enum_declaration
            name: (identifier) @name
        ) @enum

        (type_alias_declaration
            name: (type_identifier) @name
        ) @type_alias

        (variable_declarator
            name: (identifier) @name
            value: (arrow_function)
        ) @function
        "#
    }

    fn imports_query(&self) -> &str {
        r#"
        (import_statement
            source: (string) @source
        ) @import
        "#
    }

    fn exports_query(&self) -> &str {
        r#"
        (export_statement
            source: (string) @source
        ) @reexport

        (export_specifier
            name: (identifier) @name
        )

        (export_statement
            declaration: (function_declaration
                name: (identifier) @name
            )
        ) @export

        (export_statement
            declaration: (class_declaration
                name: (type_identifier) @name
            )
        ) @export
        "#
    }

    fn calls_query(&self) -> &str {
        r#"
        (call_expression
            function: (identifier) @callee
        ) @call

        (new_expression
            constructor: (identifier) @callee
        ) @constructor_call

        (class_heritage
            (extends_clause
                (identifier) @extends
            )
        )

        (class_heritage
            (implements_clause
                (type_identifier) @implements
            )
        )
        "#
    }
}
