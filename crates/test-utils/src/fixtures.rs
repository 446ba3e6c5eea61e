//! BSL sources shared by tests and benchmarks.

/// A form module: a client/server method using the deprecated `ЭтаФорма`.
pub const FORM_MODULE: &str = r#"&НаКлиенте
Процедура ПриОткрытии(Отказ)
	ЭтаФорма.Заголовок = "Документ";
КонецПроцедуры
"#;

/// A common module with a missing space, a hard-coded path and a TODO.
pub const COMMON_MODULE: &str = r#"// TODO: вынести в настройки
Функция КаталогОбмена() Экспорт
	Каталог="C:\Обмен\Входящие";
	Возврат Каталог;
КонецФункции
"#;

/// A module without findings from the built-in rules.
pub const CLEAN_MODULE: &str = "Процедура Тест()\n\tА = 1;\nКонецПроцедуры\n";

/// A procedure missing its closing keyword.
pub const BROKEN_MODULE: &str = "Процедура Тест()\n\tА = 1;\n";

/// A larger module for throughput measurements.
#[must_use]
pub fn large_module(methods: usize) -> String {
    let mut text = String::from("Перем Кэш Экспорт;\n\n");
    for i in 0..methods {
        text.push_str(&format!(
            "&НаСервере\nФункция Вычислить{i}(Знач А, Б = 1) Экспорт\n\tИтог = 0;\n\tДля Каждого Элемент Из А Цикл\n\t\tЕсли Элемент > Б Тогда\n\t\t\tИтог = Итог + Элемент;\n\t\tКонецЕсли;\n\tКонецЦикла;\n\tСообщить(\"Итог: \" + Итог);\n\tВозврат Итог;\nКонецФункции\n\n"
        ));
    }
    text
}

/// `file://` URI for a test module name.
#[must_use]
pub fn uri(name: &str) -> bsl_types::DocumentUri {
    bsl_types::DocumentUri::new(format!("file:///project/src/{name}"))
}
