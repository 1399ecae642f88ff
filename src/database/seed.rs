use sqlx::{Sqlite, Transaction};

struct SeedCourse {
    id: u32,
    title: &'static str,
    description: &'static str,
    long_description: &'static str,
    category: &'static str,
    duration: &'static str,
    level: &'static str,
    image_path: &'static str,
    is_popular: bool,
}

const MATERIALS_PATH: &str = "./static/materials/Course1.zip";

const COURSES: &[SeedCourse] = &[
    SeedCourse {
        id: 1,
        title: "Frontend‑разработчик с нуля",
        description: "HTML, CSS, JavaScript и адаптивная вёрстка.",
        long_description: "Подробная программа по основам веб‑разработки: семантическая вёрстка, адаптивный дизайн, работа с макетами, базовый JavaScript и подготовка портфолио‑проекта.",
        category: "Программирование",
        duration: "4,5 месяца",
        level: "Начинающий",
        image_path: "./static/photo1.jpg",
        is_popular: true,
    },
    SeedCourse {
        id: 2,
        title: "UX/UI‑дизайн цифровых продуктов",
        description: "Исследование пользователей, прототипирование и Figma.",
        long_description: "Курс по созданию удобных интерфейсов: исследование аудитории, CJM, прототипы, дизайн‑системы и подготовка кейса в портфолио в Figma.",
        category: "Дизайн",
        duration: "3 месяца",
        level: "Продолжающий",
        image_path: "./static/photo3.jpg",
        is_popular: true,
    },
    SeedCourse {
        id: 3,
        title: "Аналитик данных",
        description: "SQL, BI‑инструменты и построение дашбордов для бизнеса.",
        long_description: "Практический курс по аналитике данных: SQL, основы статистики, построение отчётов и дашбордов в BI‑инструментах и аналитический проект.",
        category: "Аналитика",
        duration: "4 месяца",
        level: "Начинающий",
        image_path: "./static/photo4.jpg",
        is_popular: true,
    },
    SeedCourse {
        id: 4,
        title: "Backend на Python",
        description: "Django, REST API и базы данных.",
        long_description: "Практический курс по серверной разработке: Django, DRF, ORM, аутентификация, деплой и работа с БД.",
        category: "Программирование",
        duration: "5 месяцев",
        level: "Продолжающий",
        image_path: "./static/photo2.jpg",
        is_popular: false,
    },
    SeedCourse {
        id: 5,
        title: "Digital‑маркетолог",
        description: "Стратегия продвижения и аналитика кампаний.",
        long_description: "Онлайн‑маркетинг от стратегии до аналитики: работа с каналами трафика, креативами, воронками и метриками эффективности.",
        category: "Маркетинг",
        duration: "3,5 месяца",
        level: "Продолжающий",
        image_path: "./static/photo5.jpg",
        is_popular: false,
    },
    SeedCourse {
        id: 6,
        title: "Fullstack‑разработчик",
        description: "Frontend + backend для комплексных веб‑приложений.",
        long_description: "Комплексная программа: современный frontend и backend, работа с API, БД и деплоем боевого приложения.",
        category: "Программирование",
        duration: "6 месяцев",
        level: "Интенсив",
        image_path: "./static/photo6.jpg",
        is_popular: false,
    },
];

// (id, course_id, position, title)
const MODULES: &[(u32, u32, u32, &str)] = &[
    (1, 4, 1, "Основы Python"),
    (2, 4, 2, "Работа с данными"),
    (3, 1, 1, "Первая страница"),
];

// (id, module_id, position, title, content)
const LESSONS: &[(u32, u32, u32, &str, &str)] = &[
    (
        1,
        1,
        1,
        "Функции и строки",
        "Функция объявляется через def, f-строки подставляют значения в текст.",
    ),
    (
        2,
        1,
        2,
        "Списки и циклы",
        "Цикл for перебирает элементы списка, sum() складывает числа.",
    ),
    (
        3,
        2,
        1,
        "Словари",
        "Словарь хранит пары ключ-значение; dict.get() возвращает значение по умолчанию.",
    ),
    (
        4,
        2,
        2,
        "Свободная практика",
        "Запустите любой код и посмотрите на вывод интерпретатора.",
    ),
    (
        5,
        3,
        1,
        "Структура HTML-документа",
        "Документ состоит из head и body, разметка описывает смысл содержимого.",
    ),
];

// (id, lesson_id, title, description, starter_code, checker_code)
const TASKS: &[(u32, u32, &str, &str, &str, Option<&str>)] = &[
    (
        1,
        1,
        "Приветствие",
        "Напишите функцию greet(name), которая возвращает строку «Привет, <name>!».",
        "def greet(name):\n    pass\n",
        Some("assert greet('Мир') == 'Привет, Мир!'\nassert greet('Python') == 'Привет, Python!'\nprint('OK')"),
    ),
    (
        2,
        2,
        "Сумма чётных",
        "Напишите функцию sum_even(numbers), возвращающую сумму чётных чисел списка.",
        "def sum_even(numbers):\n    return 0\n",
        Some("assert sum_even([1, 2, 3, 4]) == 6\nassert sum_even([]) == 0\nassert sum_even([-2, 5]) == -2\nprint('OK')"),
    ),
    (
        3,
        3,
        "Частота слов",
        "Напишите функцию count_words(text), возвращающую словарь «слово -> количество».",
        "def count_words(text):\n    return {}\n",
        Some("assert count_words('a b a') == {'a': 2, 'b': 1}\nassert count_words('') == {}\nprint('OK')"),
    ),
    (
        4,
        4,
        "Песочница",
        "Любой код без проверки: задание считается выполненным, если программа завершилась без ошибок.",
        "print('Hello, world!')\n",
        None,
    ),
];

/// Inserts the demo catalog: courses, their modules, lessons and coding tasks
pub(super) async fn seed_catalog(tx: &mut Transaction<'_, Sqlite>) -> sqlx::Result<()> {
    for course in COURSES {
        sqlx::query(
            r#"
            INSERT INTO courses (id, title, description, long_description, category, duration, level, image_path, materials_path, is_popular)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(course.id)
        .bind(course.title)
        .bind(course.description)
        .bind(course.long_description)
        .bind(course.category)
        .bind(course.duration)
        .bind(course.level)
        .bind(course.image_path)
        .bind(MATERIALS_PATH)
        .bind(course.is_popular)
        .execute(&mut **tx)
        .await?;
    }

    for &(id, course_id, position, title) in MODULES {
        sqlx::query("INSERT INTO modules (id, course_id, position, title) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(course_id)
            .bind(position)
            .bind(title)
            .execute(&mut **tx)
            .await?;
    }

    for &(id, module_id, position, title, content) in LESSONS {
        sqlx::query(
            "INSERT INTO lessons (id, module_id, position, title, content) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(module_id)
        .bind(position)
        .bind(title)
        .bind(content)
        .execute(&mut **tx)
        .await?;
    }

    for &(id, lesson_id, title, description, starter_code, checker_code) in TASKS {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, lesson_id, title, description, starter_code, checker_code)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(lesson_id)
        .bind(title)
        .bind(description)
        .bind(starter_code)
        .bind(checker_code)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
