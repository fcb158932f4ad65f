use criterion::{Criterion, criterion_group, criterion_main};
use prismtm::{HighlightOptions, Registry, ThemeVariant};

const SAMPLE: &str = r#"
function debounce(fn, wait) {
    let timeout = null;
    return function (...args) {
        const context = this;
        clearTimeout(timeout);
        timeout = setTimeout(() => fn.apply(context, args), wait);
    };
}

class EventEmitter {
    constructor() {
        this.listeners = new Map();
    }

    on(event, handler) {
        if (!this.listeners.has(event)) {
            this.listeners.set(event, []);
        }
        this.listeners.get(event).push(handler);
        return this;
    }

    emit(event, ...args) {
        const handlers = this.listeners.get(event) || [];
        for (const handler of handlers) {
            handler(...args);
        }
    }
}

const emitter = new EventEmitter();
emitter.on("tick", (n) => console.log(`tick ${n}`));
for (let i = 0; i < 10; i++) {
    emitter.emit("tick", i);
}
"#;

fn highlight_benchmark(c: &mut Criterion) {
    let registry =
        Registry::load_from_file("builtin.zst").expect("Failed to load registry from builtin.zst");

    let options = HighlightOptions::new("javascript", ThemeVariant::Single("vitesse-black"));

    c.bench_function("highlight javascript sample", |b| {
        b.iter(|| {
            let result = registry.highlight(SAMPLE, &options).unwrap();
            std::hint::black_box(result);
        })
    });
}

criterion_group!(benches, highlight_benchmark);
criterion_main!(benches);
