use crate::bdd::Bdd;
use crate::formula::{Formula, Literal};
use crate::reference::Ref;
use crate::types::Variables;

/// Anything that can be built as a BDD given a name-to-variable mapping.
pub trait Eval {
    fn eval(&self, bdd: &Bdd, vars: &mut Variables) -> Ref;
}

impl Bdd {
    pub fn eval(&self, value: &impl Eval, vars: &mut Variables) -> Ref {
        value.eval(self, vars)
    }
}

impl Eval for Ref {
    fn eval(&self, _bdd: &Bdd, _vars: &mut Variables) -> Ref {
        *self
    }
}

impl Eval for Literal {
    fn eval(&self, bdd: &Bdd, vars: &mut Variables) -> Ref {
        let var = bdd.mk_var(vars.intern(&self.name).id());
        if self.positive {
            var
        } else {
            -var
        }
    }
}

impl Eval for Formula {
    fn eval(&self, bdd: &Bdd, vars: &mut Variables) -> Ref {
        match self {
            Formula::Literal(lit) => lit.eval(bdd, vars),
            Formula::Not(f) => bdd.apply_not(f.eval(bdd, vars)),
            Formula::And(fs) => {
                let nodes: Vec<Ref> = fs.iter().map(|f| f.eval(bdd, vars)).collect();
                bdd.apply_and_many(nodes)
            }
            Formula::Or(fs) => {
                let nodes: Vec<Ref> = fs.iter().map(|f| f.eval(bdd, vars)).collect();
                bdd.apply_or_many(nodes)
            }
            Formula::Implies(a, b) => {
                let a = a.eval(bdd, vars);
                let b = b.eval(bdd, vars);
                bdd.apply_imply(a, b)
            }
            Formula::True => bdd.one,
            Formula::False => bdd.zero,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_eval_matches_operators() {
        let bdd = Bdd::default();
        let mut vars = Variables::new();
        let f = Formula::implies(Formula::var("A"), Formula::not(Formula::var("B")));
        let g = Formula::or([Formula::lit("A", false), Formula::lit("B", false)]);
        assert_eq!(bdd.eval(&f, &mut vars), bdd.eval(&g, &mut vars));
        assert_eq!(vars.len(), 2);

        let a = bdd.mk_var(vars.intern("A").id());
        let b = bdd.mk_var(vars.intern("B").id());
        assert_eq!(bdd.eval(&f, &mut vars), -bdd.apply_and(a, b));
    }

    #[test]
    fn test_eval_constants() {
        let bdd = Bdd::default();
        let mut vars = Variables::new();
        assert_eq!(bdd.eval(&Formula::True, &mut vars), bdd.one);
        assert_eq!(bdd.eval(&Formula::and(Vec::<Formula>::new()), &mut vars), bdd.one);
        assert_eq!(bdd.eval(&Formula::or(Vec::<Formula>::new()), &mut vars), bdd.zero);
        let contradiction = Formula::and([Formula::var("A"), Formula::not(Formula::var("A"))]);
        assert_eq!(bdd.eval(&contradiction, &mut vars), bdd.zero);
    }
}
